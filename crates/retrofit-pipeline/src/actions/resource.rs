//! Structural actions on the node itself: rename, copy, move, delete.
//!
//! Destinations are checked against the store before anything is written so
//! that a dry run reports the same outcome a live run would.

use retrofit_types::path;
use retrofit_types::{ActionResult, Node, Result};

use crate::context::RunContext;
use crate::pattern::Pattern;

pub(super) fn rename(
    node: &Node,
    ctx: &mut RunContext<'_>,
    new_name: &str,
) -> Result<ActionResult> {
    path::validate_name(new_name)?;
    if node.name() == new_name {
        return Ok(ActionResult::no_change(format!(
            "{} already named {new_name}",
            node.path
        )));
    }
    let Some(parent) = node.parent_path() else {
        return Ok(ActionResult::failed("The root node cannot be renamed"));
    };
    let target = path::join(parent, new_name);
    if ctx.store().get(&target)?.is_some() {
        return Ok(ActionResult::failed(format!("{target} already exists")));
    }
    ctx.mutate(|s| s.rename_node(&node.path, new_name))?;
    Ok(ActionResult::applied(format!("Renamed {} to {target}", node.path)))
}

/// Copy or move the node below the node at `relative_path`.
pub(super) fn relocate_relative(
    node: &Node,
    ctx: &mut RunContext<'_>,
    relative_path: &str,
    is_move: bool,
) -> Result<ActionResult> {
    let dest_parent = path::resolve_relative(&node.path, relative_path)?;
    relocate(node, ctx, &dest_parent, is_move)
}

pub(super) fn move_by_pattern(
    node: &Node,
    ctx: &mut RunContext<'_>,
    pattern: &Pattern,
    target: &str,
) -> Result<ActionResult> {
    if !pattern.is_match(&node.path) {
        return Ok(ActionResult::no_change(format!(
            "{} does not match {pattern}",
            node.path
        )));
    }
    let dest_parent = pattern.replace_all(&node.path, target);
    path::validate_absolute(&dest_parent)?;
    relocate(node, ctx, &dest_parent, true)
}

fn relocate(
    node: &Node,
    ctx: &mut RunContext<'_>,
    dest_parent: &str,
    is_move: bool,
) -> Result<ActionResult> {
    if ctx.store().get(dest_parent)?.is_none() {
        return Ok(ActionResult::failed(format!(
            "Destination {dest_parent} does not exist"
        )));
    }
    if path::is_same_or_descendant(dest_parent, &node.path) {
        return Ok(ActionResult::failed(format!(
            "Cannot place {} inside itself",
            node.path
        )));
    }
    let target = path::join(dest_parent, node.name());
    if is_move && node.parent_path() == Some(dest_parent) {
        return Ok(ActionResult::no_change(format!("{} already in {dest_parent}", node.path)));
    }
    if ctx.store().get(&target)?.is_some() {
        return Ok(ActionResult::failed(format!("{target} already exists")));
    }

    if is_move {
        ctx.mutate(|s| s.move_node(&node.path, dest_parent))?;
        Ok(ActionResult::applied(format!("Moved {} to {target}", node.path)))
    } else {
        ctx.mutate(|s| s.copy_node(&node.path, dest_parent))?;
        Ok(ActionResult::applied(format!("Copied {} to {target}", node.path)))
    }
}

pub(super) fn delete(node: &Node, ctx: &mut RunContext<'_>) -> Result<ActionResult> {
    if node.parent_path().is_none() {
        return Ok(ActionResult::failed("The root node cannot be deleted"));
    }
    ctx.mutate(|s| s.delete_node(&node.path))?;
    Ok(ActionResult::applied(format!("Deleted {}", node.path)))
}
