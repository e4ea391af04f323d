//! Actions on the page containing a node.
//!
//! The containing page is the nearest ancestor-or-self whose primary type is
//! `cq:Page`. Tags live in the `cq:tags` multi-value of the page's
//! `jcr:content` child.

use retrofit_store::ContentStore;
use retrofit_types::path;
use retrofit_types::{ActionResult, Node, Result, Value};

use crate::context::RunContext;
use crate::services::ReplicationAction;

pub const PAGE_TYPE: &str = "cq:Page";
pub const CONTENT_NODE: &str = "jcr:content";
pub const TAGS_PROPERTY: &str = "cq:tags";
pub const LAST_REPLICATION_ACTION: &str = "cq:lastReplicationAction";

/// Path of the page containing `node_path`, if any.
pub fn containing_page(store: &dyn ContentStore, node_path: &str) -> Result<Option<String>> {
    let mut current = Some(node_path);
    while let Some(p) = current {
        if let Some(node) = store.get(p)? {
            if node.primary_type() == Some(PAGE_TYPE) {
                return Ok(Some(p.to_string()));
            }
        }
        current = path::parent(p);
    }
    Ok(None)
}

fn no_page(node: &Node) -> ActionResult {
    ActionResult::failed(format!("No containing page for {}", node.path))
}

pub(super) fn replicate(
    node: &Node,
    ctx: &mut RunContext<'_>,
    action: ReplicationAction,
) -> Result<ActionResult> {
    let Some(page) = containing_page(ctx.store(), &node.path)? else {
        return Ok(no_page(node));
    };
    let Some(replicator) = ctx.services().replicator.clone() else {
        return Ok(ActionResult::failed("Replication service not available"));
    };
    if !ctx.is_dry_run() {
        replicator.replicate(&page, action)?;
    }
    let verb = match action {
        ReplicationAction::Activate => "Activated",
        ReplicationAction::Deactivate => "Deactivated",
    };
    Ok(ActionResult::applied(format!("{verb} page {page}")))
}

fn is_deactivated(store: &dyn ContentStore, page: &str) -> Result<bool> {
    Ok(store
        .get(&path::join(page, CONTENT_NODE))?
        .and_then(|content| {
            content
                .property(LAST_REPLICATION_ACTION)
                .and_then(Value::as_str)
                .map(|a| a == "Deactivate")
        })
        .unwrap_or(false))
}

pub(super) fn tree_activate(
    node: &Node,
    ctx: &mut RunContext<'_>,
    skip_deactivated: bool,
) -> Result<ActionResult> {
    let Some(page) = containing_page(ctx.store(), &node.path)? else {
        return Ok(no_page(node));
    };
    let Some(replicator) = ctx.services().replicator.clone() else {
        return Ok(ActionResult::failed("Replication service not available"));
    };

    let mut to_activate = Vec::new();
    let mut skipped = 0;
    for candidate in ctx.store().descendants(&page, true, None)? {
        if candidate.primary_type() != Some(PAGE_TYPE) {
            continue;
        }
        if skip_deactivated && is_deactivated(ctx.store(), &candidate.path)? {
            skipped += 1;
            continue;
        }
        to_activate.push(candidate.path);
    }

    if !ctx.is_dry_run() {
        for p in &to_activate {
            replicator.replicate(p, ReplicationAction::Activate)?;
        }
    }
    Ok(ActionResult::applied(format!(
        "Tree activated page {page}: {} activated, {skipped} skipped",
        to_activate.len()
    )))
}

pub(super) fn delete(node: &Node, ctx: &mut RunContext<'_>) -> Result<ActionResult> {
    let Some(page) = containing_page(ctx.store(), &node.path)? else {
        return Ok(no_page(node));
    };
    ctx.mutate(|s| s.delete_node(&page))?;
    Ok(ActionResult::applied(format!("Deleted page {page}")))
}

#[derive(Debug, Clone, Copy)]
pub(super) enum TagUpdate {
    Add,
    Set,
    Remove,
}

pub(super) fn update_tags(
    node: &Node,
    ctx: &mut RunContext<'_>,
    update: TagUpdate,
    tags: &[String],
) -> Result<ActionResult> {
    let Some(page) = containing_page(ctx.store(), &node.path)? else {
        return Ok(no_page(node));
    };
    let content_path = path::join(&page, CONTENT_NODE);
    let Some(content) = ctx.store().get(&content_path)? else {
        return Ok(ActionResult::failed(format!(
            "Page {page} has no {CONTENT_NODE} node"
        )));
    };

    let current: Vec<String> = content
        .property(TAGS_PROPERTY)
        .map(|v| v.values().iter().map(|t| t.to_string()).collect())
        .unwrap_or_default();

    let updated: Vec<String> = match update {
        TagUpdate::Add => {
            let mut all = current.clone();
            for tag in tags {
                if !all.contains(tag) {
                    all.push(tag.clone());
                }
            }
            all
        }
        TagUpdate::Set => tags.to_vec(),
        TagUpdate::Remove => current.iter().filter(|t| !tags.contains(t)).cloned().collect(),
    };

    if updated == current {
        return Ok(ActionResult::no_change(format!("Tags of page {page} unchanged")));
    }

    let listed = Value::multi(tags.iter().cloned());
    ctx.mutate(|s| s.set_property(&content_path, TAGS_PROPERTY, Value::multi(updated)))?;
    let message = match update {
        TagUpdate::Add => format!("Added tags {listed} to page {page}"),
        TagUpdate::Set => format!("Set tags {listed} on page {page}"),
        TagUpdate::Remove => format!("Removed tags {listed} from page {page}"),
    };
    Ok(ActionResult::applied(message))
}

pub(super) fn check_rendering(
    node: &Node,
    ctx: &mut RunContext<'_>,
    expected_status: u16,
    text_present: Option<&str>,
    text_absent: Option<&str>,
) -> Result<ActionResult> {
    let Some(page) = containing_page(ctx.store(), &node.path)? else {
        return Ok(no_page(node));
    };
    let Some(renderer) = ctx.services().renderer.clone() else {
        return Ok(ActionResult::failed("Rendering service not available"));
    };

    let response = renderer.render(&page)?;
    if response.status != expected_status {
        return Ok(ActionResult::failed(format!(
            "Page {page} returned status {}, expected {expected_status}",
            response.status
        )));
    }
    if let Some(text) = text_present {
        if !response.body.contains(text) {
            return Ok(ActionResult::failed(format!(
                "Page {page} does not contain '{text}'"
            )));
        }
    }
    if let Some(text) = text_absent {
        if response.body.contains(text) {
            return Ok(ActionResult::failed(format!("Page {page} contains '{text}'")));
        }
    }
    Ok(ActionResult::no_change(format!(
        "Page {page} rendered with status {}",
        response.status
    )))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::actions::test_support::*;
    use crate::actions::Action;
    use crate::context::RunMode;
    use crate::services::{RecordingReplicator, Services, StaticRenderer};
    use serde_json::json;

    fn base() -> retrofit_store::MemoryStore {
        store(json!({
            "content": {
                "site": {
                    "jcr:primaryType": "cq:Page",
                    "jcr:content": { "cq:tags": ["site:a"] },
                    "en": {
                        "jcr:primaryType": "cq:Page",
                        "jcr:content": {
                            "cq:tags": ["site:a", "site:b"],
                            "par": { "text": { "value": "hello" } }
                        },
                        "old": {
                            "jcr:primaryType": "cq:Page",
                            "jcr:content": { "cq:lastReplicationAction": "Deactivate" }
                        }
                    }
                },
                "loose": { "x": {} }
            }
        }))
    }

    const COMPONENT: &str = "/content/site/en/jcr:content/par/text";

    #[test]
    fn finds_containing_page() {
        let s = base();
        assert_eq!(
            containing_page(&s, COMPONENT).unwrap().as_deref(),
            Some("/content/site/en")
        );
        assert_eq!(
            containing_page(&s, "/content/site").unwrap().as_deref(),
            Some("/content/site")
        );
        assert_eq!(containing_page(&s, "/content/loose/x").unwrap(), None);
    }

    #[test]
    fn activate_records_replication_in_live_mode_only() {
        let replicator = Arc::new(RecordingReplicator::new());
        let services = Services::new().with_replicator(replicator.clone());

        let mut dry = base();
        let activate = Action::ActivateContainingPage;
        let result = apply(&mut dry, &services, RunMode::Dry, &activate, COMPONENT).unwrap();
        assert_eq!(result, ActionResult::applied("Activated page /content/site/en"));
        assert!(replicator.calls().is_empty());

        let mut live = base();
        apply(&mut live, &services, RunMode::Live, &Action::ActivateContainingPage, COMPONENT)
            .unwrap();
        assert_eq!(
            replicator.calls(),
            vec![("/content/site/en".to_string(), ReplicationAction::Activate)]
        );
    }

    #[test]
    fn replication_without_service_fails() {
        let (result, _) = apply_both(
            &base(),
            &Services::new(),
            &Action::DeactivateContainingPage,
            COMPONENT,
        );
        assert_eq!(result, ActionResult::failed("Replication service not available"));
    }

    #[test]
    fn node_outside_page_fails() {
        let services = Services::new().with_replicator(Arc::new(RecordingReplicator::new()));
        let (result, _) = apply_both(
            &base(),
            &services,
            &Action::ActivateContainingPage,
            "/content/loose/x",
        );
        assert_eq!(result, ActionResult::failed("No containing page for /content/loose/x"));
    }

    #[test]
    fn tree_activate_skips_deactivated_pages() {
        let replicator = Arc::new(RecordingReplicator::new());
        let services = Services::new().with_replicator(replicator.clone());
        let mut s = base();
        let action = Action::TreeActivateContainingPage {
            skip_deactivated: true,
        };
        let result = apply(&mut s, &services, RunMode::Live, &action, "/content/site").unwrap();
        assert_eq!(
            result,
            ActionResult::applied("Tree activated page /content/site: 2 activated, 1 skipped")
        );
        let pages: Vec<String> = replicator.calls().into_iter().map(|(p, _)| p).collect();
        assert_eq!(pages, vec!["/content/site", "/content/site/en"]);
    }

    #[test]
    fn tree_activate_everything() {
        let replicator = Arc::new(RecordingReplicator::new());
        let services = Services::new().with_replicator(replicator.clone());
        let mut s = base();
        let action = Action::TreeActivateContainingPage {
            skip_deactivated: false,
        };
        apply(&mut s, &services, RunMode::Live, &action, "/content/site").unwrap();
        assert_eq!(replicator.calls().len(), 3);
    }

    #[test]
    fn delete_containing_page() {
        let (result, live) = apply_both(
            &base(),
            &Services::new(),
            &Action::DeleteContainingPage,
            COMPONENT,
        );
        assert_eq!(result, ActionResult::applied("Deleted page /content/site/en"));
        assert!(live.get("/content/site/en").unwrap().is_none());
        assert!(live.get("/content/site").unwrap().is_some());
    }

    #[test]
    fn add_set_remove_tags() {
        let content = "/content/site/en/jcr:content";
        let add = Action::AddTagsToContainingPage {
            tags: vec!["site:b".into(), "site:c".into()],
        };
        let (result, live) = apply_both(&base(), &Services::new(), &add, COMPONENT);
        assert!(result.is_applied());
        assert_eq!(
            node(&live, content).property(TAGS_PROPERTY),
            Some(&Value::multi(["site:a", "site:b", "site:c"]))
        );

        let remove = Action::RemoveTagsFromContainingPage {
            tags: vec!["site:a".into()],
        };
        let (result, live) = apply_both(&live, &Services::new(), &remove, COMPONENT);
        assert_eq!(
            result,
            ActionResult::applied("Removed tags [site:a] from page /content/site/en")
        );
        assert_eq!(
            node(&live, content).property(TAGS_PROPERTY),
            Some(&Value::multi(["site:b", "site:c"]))
        );

        let set = Action::SetTagsForContainingPage {
            tags: vec!["site:z".into()],
        };
        let (_, live) = apply_both(&live, &Services::new(), &set, COMPONENT);
        assert_eq!(
            node(&live, content).property(TAGS_PROPERTY),
            Some(&Value::multi(["site:z"]))
        );

        let (again, _) = apply_both(&live, &Services::new(), &set, COMPONENT);
        assert!(matches!(again, ActionResult::NoChange(_)));
    }

    #[test]
    fn check_rendering_outcomes() {
        let renderer = StaticRenderer::new().with_page("/content/site/en", 200, "<p>Welcome</p>");
        let services = Services::new().with_renderer(Arc::new(renderer));

        let ok = Action::CheckPageRendering {
            expected_status: 200,
            text_present: Some("Welcome".into()),
            text_absent: Some("Error".into()),
        };
        let (result, _) = apply_both(&base(), &services, &ok, COMPONENT);
        assert_eq!(
            result,
            ActionResult::no_change("Page /content/site/en rendered with status 200")
        );

        let missing_text = Action::CheckPageRendering {
            expected_status: 200,
            text_present: Some("Goodbye".into()),
            text_absent: None,
        };
        let (result, _) = apply_both(&base(), &services, &missing_text, COMPONENT);
        assert!(result.is_failed());

        let wrong_status = Action::CheckPageRendering {
            expected_status: 200,
            text_present: None,
            text_absent: None,
        };
        let (result, _) = apply_both(&base(), &services, &wrong_status, "/content/site");
        assert_eq!(
            result,
            ActionResult::failed("Page /content/site returned status 404, expected 200")
        );
    }
}
