//! End-to-end integration tests for the retrofit migration pipeline.
//!
//! Each test exercises the full pipeline: load content -> build plan ->
//! validate -> run dry or live -> inspect the report and the store.

use std::sync::Arc;

use serde_json::json;

use retrofit_pipeline::{
    validate, validate_or_raise, Action, MigrationBuilder, RecordingReplicator, ReplicationAction,
    ReportLine, RunMode, Services, Severity, StaticRenderer,
};
use retrofit_store::{ContentStore, MemoryStore};
use retrofit_types::{ActionResult, RetrofitError, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn site_store() -> MemoryStore {
    MemoryStore::from_json(&json!({
        "content": {
            "site": {
                "with": { "jcr:title": "With title" },
                "without": { "sling:resourceType": "app/page" }
            }
        }
    }))
    .unwrap()
}

fn flat_store() -> MemoryStore {
    MemoryStore::from_json(&json!({
        "a": {},
        "b": {},
        "c": { "x": {}, "y": {} }
    }))
    .unwrap()
}

fn migrate_titled() -> MigrationBuilder {
    MigrationBuilder::new()
        .for_child_resources_of("/content/site")
        .filter_by_has_property("jcr:title")
        .do_set_property("status", "migrated")
}

// ---------------------------------------------------------------------------
// Test 1: dry run reports the change and leaves the store untouched
// ---------------------------------------------------------------------------

#[test]
fn dry_run_reports_without_writing() {
    let plan = migrate_titled().build().unwrap();
    let diags = validate_or_raise(&plan).expect("validation should pass");
    assert!(diags.iter().all(|d| d.severity != Severity::Error));

    let mut store = site_store();
    let before = store.to_json();
    let report = plan.dry_run(&mut store, &Services::new()).unwrap();

    assert_eq!(
        report.text_lines(),
        vec![
            "Running content upgrade DRY...",
            "/content/site/with",
            "  APPLIED set_property(status): Set property status = migrated"
        ]
    );
    assert_eq!(report.nodes_visited, 1);
    assert_eq!(report.nodes_filtered, 1);
    assert!(!report.committed);
    assert_eq!(store.commit_calls(), 0);
    assert!(!store.has_pending_changes());
    assert!(store.get("/content/site/with").unwrap().unwrap().property("status").is_none());
    assert_eq!(store.to_json(), before);
}

// ---------------------------------------------------------------------------
// Test 2: live run produces the same trace and commits exactly once
// ---------------------------------------------------------------------------

#[test]
fn live_run_matches_dry_trace_and_commits_once() {
    let plan = migrate_titled().build().unwrap();

    let mut dry_store = site_store();
    let dry = plan.dry_run(&mut dry_store, &Services::new()).unwrap();

    let mut store = site_store();
    let live = plan.run_live(&mut store, &Services::new()).unwrap();

    assert_eq!(live.text_lines()[0], "Running content upgrade ...");
    assert_eq!(live.text_lines()[1..], dry.text_lines()[1..]);
    assert!(live.committed);
    assert_eq!(store.commit_calls(), 1);
    assert_eq!(store.commit_count(), 1);
    assert_eq!(
        store.committed_node("/content/site/with").unwrap().property("status"),
        Some(&Value::from("migrated"))
    );
    assert!(store
        .committed_node("/content/site/without")
        .unwrap()
        .property("status")
        .is_none());
}

// ---------------------------------------------------------------------------
// Test 3: non-fatal failures are reported for every node of every traversal
// ---------------------------------------------------------------------------

#[test]
fn failing_action_is_reported_for_every_node() {
    let plan = MigrationBuilder::new()
        .for_resources(["/a", "/b"])
        .for_child_resources_of("/c")
        .do_custom_fn("always_fails", |node, _ctx| {
            Ok(ActionResult::failed(format!("cannot migrate {}", node.path)))
        })
        .build()
        .unwrap();

    let mut store = flat_store();
    let report = plan.dry_run(&mut store, &Services::new()).unwrap();

    assert_eq!(report.visited_paths(), vec!["/a", "/b", "/c/x", "/c/y"]);
    assert_eq!(report.failed, 4);
    assert!(report.action_results().iter().all(|r| r.is_failed()));
    assert!(report.has_failures());
    assert_eq!(store.commit_calls(), 0);
}

#[test]
fn non_fatal_errors_become_failed_results() {
    let plan = MigrationBuilder::new()
        .for_resources(["/a", "/b"])
        .do_custom_fn("broken", |_node, _ctx| Err(RetrofitError::Other("boom".into())))
        .print_path()
        .build()
        .unwrap();

    let mut store = flat_store();
    let report = plan.run_live(&mut store, &Services::new()).unwrap();

    assert_eq!(
        report.text_lines(),
        vec![
            "Running content upgrade ...",
            "/a",
            "  FAILED custom(broken): boom",
            "  NO CHANGE print_path: /a",
            "/b",
            "  FAILED custom(broken): boom",
            "  NO CHANGE print_path: /b"
        ]
    );
    assert_eq!(store.commit_calls(), 1);
}

// ---------------------------------------------------------------------------
// Test 4: a missing path is skipped and other traversals still run
// ---------------------------------------------------------------------------

#[test]
fn missing_paths_are_skipped() {
    let plan = MigrationBuilder::new()
        .for_child_resources_of("/nope")
        .for_resources(["/a", "/missing", "/b"])
        .for_child_resources_of("/c")
        .print_path()
        .build()
        .unwrap();

    let mut store = flat_store();
    let report = plan.dry_run(&mut store, &Services::new()).unwrap();

    assert_eq!(report.skipped, 2);
    assert_eq!(report.visited_paths(), vec!["/a", "/b", "/c/x", "/c/y"]);
    let lines = report.text_lines();
    assert_eq!(lines[1], "SKIPPED for_child_resources_of(/nope): Path '/nope' does not exist");
    assert!(lines.contains(
        &"SKIPPED for_resources([/a, /missing, /b]): Path '/missing' does not exist".to_string()
    ));
}

#[test]
fn unsupported_query_is_skipped() {
    let plan = MigrationBuilder::new()
        .for_resources_by_query("//element(*, nt:base)", retrofit_store::QueryLanguage::XPath)
        .for_resources(["/a"])
        .print_path()
        .build()
        .unwrap();
    let mut store = flat_store();
    let report = plan.dry_run(&mut store, &Services::new()).unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.visited_paths(), vec!["/a"]);
}

// ---------------------------------------------------------------------------
// Test 5: nodes are processed in traversal order, actions in declaration order
// ---------------------------------------------------------------------------

#[test]
fn order_is_preserved() {
    let plan = MigrationBuilder::new()
        .for_resources(["/c/y", "/a", "/c/x"])
        .do_set_property("step", 1_i64)
        .do_set_property("step", 2_i64)
        .print_property("step")
        .build()
        .unwrap();

    let mut store = flat_store();
    let report = plan.run_live(&mut store, &Services::new()).unwrap();

    assert_eq!(report.visited_paths(), vec!["/c/y", "/a", "/c/x"]);
    let first_node: Vec<String> = report.text_lines()[1..5].to_vec();
    assert_eq!(
        first_node,
        vec![
            "/c/y",
            "  APPLIED set_property(step): Set property step = 1",
            "  APPLIED set_property(step): Set property step = 2",
            "  NO CHANGE print_property(step): step = 2"
        ]
    );
    assert_eq!(store.committed_node("/a").unwrap().property("step"), Some(&Value::Long(2)));
}

// ---------------------------------------------------------------------------
// Test 6: three filters form one conjunction
// ---------------------------------------------------------------------------

#[test]
fn three_filters_all_apply() {
    let mut store = MemoryStore::from_json(&json!({
        "content": {
            "p1": { "jcr:title": "One", "hidden": false },
            "p2": { "jcr:title": "Two" },
            "p3": { "hidden": false },
            "skip": { "jcr:title": "Skip", "hidden": false }
        }
    }))
    .unwrap();

    let plan = MigrationBuilder::new()
        .for_child_resources_of("/content")
        .filter_by_has_property("jcr:title")
        .filter_by_property("hidden", false)
        .filter_by_node_name_regex("p[0-9]+")
        .print_path()
        .build()
        .unwrap();
    assert_eq!(plan.filter().unwrap().arity(), 3);

    let report = plan.dry_run(&mut store, &Services::new()).unwrap();
    assert_eq!(report.visited_paths(), vec!["/content/p1"]);
    assert_eq!(report.nodes_filtered, 3);
}

// ---------------------------------------------------------------------------
// Test 7: a fatal error aborts the run with a partial report
// ---------------------------------------------------------------------------

#[test]
fn fatal_error_aborts_without_commit() {
    let plan = MigrationBuilder::new()
        .for_resources(["/a", "/b"])
        .do_set_property("touched", true)
        .do_custom_fn("lose_store", |node, _ctx| {
            if node.path == "/b" {
                Err(RetrofitError::StoreUnavailable("session expired".into()))
            } else {
                Ok(ActionResult::no_change("fine"))
            }
        })
        .build()
        .unwrap();

    let mut store = flat_store();
    let failure = plan.run_live(&mut store, &Services::new()).unwrap_err();

    assert!(matches!(failure.error, RetrofitError::StoreUnavailable(_)));
    assert_eq!(
        failure.report.text_lines(),
        vec![
            "Running content upgrade ...",
            "/a",
            "  APPLIED set_property(touched): Set property touched = true",
            "  NO CHANGE custom(lose_store): fine",
            "/b",
            "  APPLIED set_property(touched): Set property touched = true",
            "  FAILED custom(lose_store): Store unavailable: session expired",
            "ABORTED: Store unavailable: session expired"
        ]
    );
    assert!(!failure.report.committed);
    assert_eq!(store.commit_calls(), 0);
    assert!(store.committed_node("/a").unwrap().property("touched").is_none());
}

#[test]
fn rejected_commit_aborts_the_run() {
    let plan = MigrationBuilder::new()
        .for_resources(["/a"])
        .do_delete_resource()
        .build()
        .unwrap();

    let mut store = flat_store();
    store.fail_next_commit("conflicting change");
    let failure = plan.run_live(&mut store, &Services::new()).unwrap_err();

    assert!(matches!(failure.error, RetrofitError::Commit(_)));
    assert!(matches!(
        failure.report.lines().last(),
        Some(ReportLine::Aborted { .. })
    ));
    assert_eq!(
        failure.report.text_lines().last().map(String::as_str),
        Some("ABORTED: Commit failed: conflicting change")
    );
    assert_eq!(store.commit_calls(), 1);
    assert_eq!(store.commit_count(), 0);
    assert!(store.committed_node("/a").is_some());
}

// ---------------------------------------------------------------------------
// Test 8: a plan can be run repeatedly
// ---------------------------------------------------------------------------

#[test]
fn dry_runs_are_repeatable() {
    let plan = MigrationBuilder::new()
        .for_descendant_resources_of("/c")
        .do_rename_property("missing", "other")
        .do_move_resource_to_relative_path("../../a")
        .build()
        .unwrap();

    let mut store = flat_store();
    let before = store.to_json();
    let first = plan.run(&mut store, &Services::new(), RunMode::Dry).unwrap();
    let second = plan.run(&mut store, &Services::new(), RunMode::Dry).unwrap();

    assert_eq!(first.text_lines(), second.text_lines());
    assert_eq!(first.applied, 2);
    assert_eq!(store.to_json(), before);
    assert_eq!(store.commit_calls(), 0);

    let live = plan.run_live(&mut store, &Services::new()).unwrap();
    assert_eq!(live.text_lines()[1..], first.text_lines()[1..]);
    assert!(store.committed_node("/a/x").is_some());
    assert!(store.committed_node("/c/x").is_none());
}

// ---------------------------------------------------------------------------
// Test 9: page actions use the configured services
// ---------------------------------------------------------------------------

fn page_store() -> MemoryStore {
    MemoryStore::from_json(&json!({
        "content": {
            "site": {
                "jcr:primaryType": "cq:Page",
                "jcr:content": { "jcr:title": "Site" },
                "en": {
                    "jcr:primaryType": "cq:Page",
                    "jcr:content": { "jcr:title": "English", "cq:tags": ["site:old"] }
                }
            }
        }
    }))
    .unwrap()
}

#[test]
fn page_actions_replicate_only_when_live() {
    let plan = MigrationBuilder::new()
        .for_resources_by_sql2_query(
            "SELECT * FROM [cq:Page] AS p WHERE ISDESCENDANTNODE(p, '/content/site')",
        )
        .do_add_tags_to_containing_page(["site:new"])
        .do_activate_containing_page()
        .build()
        .unwrap();

    let replicator = Arc::new(RecordingReplicator::new());
    let services = Services::new().with_replicator(replicator.clone());

    let mut store = page_store();
    let dry = plan.dry_run(&mut store, &services).unwrap();
    assert!(replicator.calls().is_empty());

    let live = plan.run_live(&mut store, &services).unwrap();
    assert_eq!(live.text_lines()[1..], dry.text_lines()[1..]);
    assert_eq!(
        live.text_lines()[1..],
        vec![
            "/content/site/en",
            "  APPLIED add_tags: Added tags [site:new] to page /content/site/en",
            "  APPLIED activate_page: Activated page /content/site/en"
        ]
    );
    assert_eq!(
        replicator.calls(),
        vec![("/content/site/en".to_string(), ReplicationAction::Activate)]
    );
    assert_eq!(
        store
            .committed_node("/content/site/en/jcr:content")
            .unwrap()
            .property("cq:tags"),
        Some(&Value::multi(["site:old", "site:new"]))
    );
}

#[test]
fn rendering_check_without_renderer_fails_softly() {
    let plan = MigrationBuilder::new()
        .for_resources(["/content/site/en/jcr:content"])
        .do_check_page_rendering_text("English", Some("Exception"))
        .build()
        .unwrap();

    let mut store = page_store();
    let report = plan.run_live(&mut store, &Services::new()).unwrap();
    assert_eq!(
        report.action_results(),
        vec![&ActionResult::failed("Rendering service not available")]
    );

    let renderer = StaticRenderer::new().with_page("/content/site/en", 200, "<h1>English</h1>");
    let services = Services::new().with_renderer(Arc::new(renderer));
    let report = plan.run_live(&mut store, &services).unwrap();
    assert!(matches!(report.action_results()[0], ActionResult::NoChange(_)));
    assert_eq!(store.commit_calls(), 2);
}

// ---------------------------------------------------------------------------
// Test 10: a mismatched value replacement is flagged and fails softly
// ---------------------------------------------------------------------------

#[test]
fn mismatched_replace_values_fails_without_panicking() {
    let plan = MigrationBuilder::new()
        .for_resources(["/content/n"])
        .with_action(Action::ReplaceValues {
            name: "tags".into(),
            old_values: vec![Value::from("x"), Value::from("y")],
            new_values: vec![Value::from("z")],
        })
        .build()
        .unwrap();
    assert!(validate(&plan)
        .iter()
        .any(|d| d.rule == "replace_values_length" && d.severity == Severity::Error));

    let mut store =
        MemoryStore::from_json(&json!({ "content": { "n": { "tags": ["y"] } } })).unwrap();
    let report = plan.run_live(&mut store, &Services::new()).unwrap();

    assert_eq!(
        report.text_lines()[1..],
        vec![
            "/content/n",
            "  FAILED replace_values(tags): Cannot replace values of tags: \
             2 old value(s) but 1 new value(s)"
        ]
    );
    assert_eq!(
        store.committed_node("/content/n").unwrap().property("tags"),
        Some(&Value::multi(["y"]))
    );
}

// ---------------------------------------------------------------------------
// Test 11: a move that fails halfway leaves nothing behind
// ---------------------------------------------------------------------------

#[test]
fn failed_property_move_commits_nothing() {
    let plan = MigrationBuilder::new()
        .for_resources(["/content/a"])
        .do_move_property_to_relative_path("title", None, "../b")
        .build()
        .unwrap();

    let mut store = MemoryStore::from_json(&json!({
        "content": {
            "a": { "title": "T" },
            "b": {}
        }
    }))
    .unwrap();
    store.protect("/content/a");
    let report = plan.run_live(&mut store, &Services::new()).unwrap();

    assert_eq!(report.failed, 1);
    assert!(report.action_results()[0].is_failed());
    assert!(store.committed_node("/content/b").unwrap().property("title").is_none());
    assert_eq!(
        store.committed_node("/content/a").unwrap().property("title"),
        Some(&Value::from("T"))
    );
}
