//! Multi-value property actions.
//!
//! A scalar property is treated as a one-element multi-value; the written
//! value is always a multi-value.

use retrofit_types::{ActionResult, Node, Result, Value};

use crate::context::RunContext;

fn current_values(node: &Node, name: &str) -> Vec<Value> {
    node.property(name)
        .map(|v| v.values().to_vec())
        .unwrap_or_default()
}

fn write(node: &Node, ctx: &mut RunContext<'_>, name: &str, values: Vec<Value>) -> Result<()> {
    ctx.mutate(|s| s.set_property(&node.path, name, Value::Multi(values)))?;
    Ok(())
}

pub(super) fn add(
    node: &Node,
    ctx: &mut RunContext<'_>,
    name: &str,
    values: &[Value],
) -> Result<ActionResult> {
    let mut current = current_values(node, name);
    let added: Vec<Value> = values
        .iter()
        .filter(|v| !current.contains(v))
        .cloned()
        .collect();
    if added.is_empty() && node.property(name).is_some_and(Value::is_multi) {
        return Ok(ActionResult::no_change(format!(
            "Property {name} already contains {}",
            Value::Multi(values.to_vec())
        )));
    }
    current.extend(added.iter().cloned());
    write(node, ctx, name, current)?;
    Ok(ActionResult::applied(format!(
        "Added {} to {name}",
        Value::Multi(added)
    )))
}

pub(super) fn remove(
    node: &Node,
    ctx: &mut RunContext<'_>,
    name: &str,
    values: &[Value],
) -> Result<ActionResult> {
    if !node.has_property(name) {
        return Ok(ActionResult::no_change(format!("Property {name} not present")));
    }
    let current = current_values(node, name);
    let (removed, kept): (Vec<Value>, Vec<Value>) =
        current.into_iter().partition(|v| values.contains(v));
    if removed.is_empty() {
        return Ok(ActionResult::no_change(format!(
            "Property {name} contains none of {}",
            Value::Multi(values.to_vec())
        )));
    }
    write(node, ctx, name, kept)?;
    Ok(ActionResult::applied(format!(
        "Removed {} from {name}",
        Value::Multi(removed)
    )))
}

pub(super) fn replace(
    node: &Node,
    ctx: &mut RunContext<'_>,
    name: &str,
    old_values: &[Value],
    new_values: &[Value],
) -> Result<ActionResult> {
    if old_values.len() != new_values.len() {
        return Ok(ActionResult::failed(format!(
            "Cannot replace values of {name}: {} old value(s) but {} new value(s)",
            old_values.len(),
            new_values.len()
        )));
    }
    if !node.has_property(name) {
        return Ok(ActionResult::no_change(format!("Property {name} not present")));
    }
    let current = current_values(node, name);
    let mut replaced = 0;
    let updated: Vec<Value> = current
        .into_iter()
        .map(|v| {
            match old_values
                .iter()
                .position(|old| *old == v)
                .and_then(|idx| new_values.get(idx))
            {
                Some(new) => {
                    replaced += 1;
                    new.clone()
                }
                None => v,
            }
        })
        .collect();
    if replaced == 0 {
        return Ok(ActionResult::no_change(format!(
            "Property {name} contains none of {}",
            Value::Multi(old_values.to_vec())
        )));
    }
    write(node, ctx, name, updated)?;
    Ok(ActionResult::applied(format!(
        "Replaced {replaced} value(s) in {name}"
    )))
}
