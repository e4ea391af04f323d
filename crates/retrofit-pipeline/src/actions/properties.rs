//! Single-property actions and value replacement.

use retrofit_store::ContentStore;
use retrofit_types::path;
use retrofit_types::{ActionResult, Node, Result, Value};

use super::PropertyScope;
use crate::context::RunContext;

/// One property write: `Some` sets the value, `None` removes the property.
type PropertyWrite<'a> = (&'a str, &'a str, Option<Value>);

/// Apply `writes` in order. If one fails, the writes already made are
/// restored in reverse order before the error is returned.
fn write_all(store: &mut dyn ContentStore, writes: Vec<PropertyWrite<'_>>) -> Result<()> {
    let mut undo: Vec<PropertyWrite<'_>> = Vec::with_capacity(writes.len());
    for (node_path, name, value) in writes {
        match write_one(store, node_path, name, value) {
            Ok(previous) => undo.push((node_path, name, previous)),
            Err(err) => {
                for (node_path, name, previous) in undo.into_iter().rev() {
                    if let Err(restore) = write_one(store, node_path, name, previous) {
                        tracing::warn!(
                            path = node_path,
                            property = name,
                            error = %restore,
                            "Could not restore property"
                        );
                    }
                }
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Returns the value the property held before the write.
fn write_one(
    store: &mut dyn ContentStore,
    node_path: &str,
    name: &str,
    value: Option<Value>,
) -> Result<Option<Value>> {
    let previous = store
        .get(node_path)?
        .and_then(|n| n.property(name).cloned());
    match value {
        Some(value) => store.set_property(node_path, name, value)?,
        None => {
            store.remove_property(node_path, name)?;
        }
    }
    Ok(previous)
}

pub(super) fn set(
    node: &Node,
    ctx: &mut RunContext<'_>,
    name: &str,
    value: &Value,
) -> Result<ActionResult> {
    if node.property(name) == Some(value) {
        return Ok(ActionResult::no_change(format!(
            "Property {name} already set to {value}"
        )));
    }
    ctx.mutate(|s| s.set_property(&node.path, name, value.clone()))?;
    Ok(ActionResult::applied(format!("Set property {name} = {value}")))
}

pub(super) fn delete(node: &Node, ctx: &mut RunContext<'_>, name: &str) -> Result<ActionResult> {
    if !node.has_property(name) {
        return Ok(ActionResult::no_change(format!("Property {name} not present")));
    }
    ctx.mutate(|s| s.remove_property(&node.path, name))?;
    Ok(ActionResult::applied(format!("Deleted property {name}")))
}

pub(super) fn rename(
    node: &Node,
    ctx: &mut RunContext<'_>,
    old_name: &str,
    new_name: &str,
) -> Result<ActionResult> {
    let Some(value) = node.property(old_name).cloned() else {
        return Ok(ActionResult::no_change(format!("Property {old_name} not present")));
    };
    if old_name == new_name {
        return Ok(ActionResult::no_change(format!(
            "Property {old_name} already named {new_name}"
        )));
    }
    ctx.mutate(|s| {
        write_all(
            s,
            vec![
                (node.path.as_str(), new_name, Some(value)),
                (node.path.as_str(), old_name, None),
            ],
        )
    })?;
    Ok(ActionResult::applied(format!(
        "Renamed property {old_name} to {new_name}"
    )))
}

/// Copy or move a property to the node at `relative_path`.
pub(super) fn transfer(
    node: &Node,
    ctx: &mut RunContext<'_>,
    name: &str,
    new_name: Option<&str>,
    relative_path: &str,
    remove_source: bool,
) -> Result<ActionResult> {
    let Some(value) = node.property(name).cloned() else {
        return Ok(ActionResult::no_change(format!("Property {name} not present")));
    };
    let target_path = path::resolve_relative(&node.path, relative_path)?;
    if ctx.store().get(&target_path)?.is_none() {
        return Ok(ActionResult::failed(format!(
            "Target node {target_path} does not exist"
        )));
    }
    let target_name = new_name.unwrap_or(name);
    if target_path == node.path && target_name == name {
        return Ok(ActionResult::no_change(format!(
            "Property {name} already at {target_path}"
        )));
    }

    let mut writes = vec![(target_path.as_str(), target_name, Some(value))];
    if remove_source {
        writes.push((node.path.as_str(), name, None));
    }
    ctx.mutate(|s| write_all(s, writes))?;

    let verb = if remove_source { "Moved" } else { "Copied" };
    Ok(ActionResult::applied(format!(
        "{verb} property {name} to {target_path}/{target_name}"
    )))
}

/// Rewrite string values (including string members of multi-values) of the
/// properties in `scope`.
pub(super) fn replace_value(
    node: &Node,
    ctx: &mut RunContext<'_>,
    scope: &PropertyScope,
    search: &str,
    transform: impl Fn(&str) -> String,
) -> Result<ActionResult> {
    let candidates: Vec<(&String, &Value)> = match scope {
        PropertyScope::All => node.properties.iter().collect(),
        PropertyScope::Named(names) => node
            .properties
            .iter()
            .filter(|(k, _)| names.contains(k))
            .collect(),
    };

    let mut updates = Vec::new();
    for (name, value) in candidates {
        let rewritten = rewrite(value, &transform);
        if rewritten != *value {
            updates.push((name.clone(), rewritten));
        }
    }

    if updates.is_empty() {
        return Ok(ActionResult::no_change(format!("No value matches {search}")));
    }

    let changed: Vec<String> = updates.iter().map(|(n, _)| n.clone()).collect();
    let writes: Vec<PropertyWrite<'_>> = updates
        .iter()
        .map(|(name, value)| (node.path.as_str(), name.as_str(), Some(value.clone())))
        .collect();
    ctx.mutate(|s| write_all(s, writes))?;
    Ok(ActionResult::applied(format!(
        "Replaced {search} in {}",
        changed.join(", ")
    )))
}

fn rewrite(value: &Value, transform: &impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(transform(s)),
        Value::Multi(values) => {
            Value::Multi(values.iter().map(|v| rewrite(v, transform)).collect())
        }
        other => other.clone(),
    }
}
