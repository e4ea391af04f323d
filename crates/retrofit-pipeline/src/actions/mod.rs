//! Built-in actions and the custom action extension point.
//!
//! Every action receives the current node snapshot and the run context and
//! returns an [`ActionResult`] whose text is the same in dry-run and live
//! mode. Store writes go through [`RunContext::mutate`], so dry runs never
//! touch the store. An `Err` return is recorded as a failure of that action
//! unless it is fatal, in which case the run aborts.

mod multivalue;
mod page;
mod print;
mod properties;
mod resource;

use std::fmt;
use std::sync::Arc;

use retrofit_types::{ActionResult, Node, Result, Value};

use crate::context::RunContext;
use crate::pattern::Pattern;

// ---------------------------------------------------------------------------
// CustomAction
// ---------------------------------------------------------------------------

/// Caller-supplied action.
///
/// Implementations must respect dry-run mode; writing through
/// [`RunContext::mutate`] does that automatically.
pub trait CustomAction: Send + Sync {
    fn name(&self) -> &str {
        "custom"
    }

    fn apply(&self, node: &Node, ctx: &mut RunContext<'_>) -> Result<ActionResult>;
}

impl fmt::Debug for dyn CustomAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomAction({})", self.name())
    }
}

/// Adapts a closure to [`CustomAction`].
pub struct FnAction<F> {
    name: String,
    action: F,
}

impl<F> FnAction<F>
where
    F: Fn(&Node, &mut RunContext<'_>) -> Result<ActionResult> + Send + Sync,
{
    pub fn new(name: impl Into<String>, action: F) -> Self {
        Self {
            name: name.into(),
            action,
        }
    }
}

impl<F> CustomAction for FnAction<F>
where
    F: Fn(&Node, &mut RunContext<'_>) -> Result<ActionResult> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, node: &Node, ctx: &mut RunContext<'_>) -> Result<ActionResult> {
        (self.action)(node, ctx)
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Which string properties a value replacement touches.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyScope {
    All,
    Named(Vec<String>),
}

#[derive(Debug, Clone)]
pub enum Action {
    // === Properties ===
    SetProperty {
        name: String,
        value: Value,
    },
    DeleteProperty {
        name: String,
    },
    RenameProperty {
        old_name: String,
        new_name: String,
    },
    /// Copy a property to the node at `relative_path`, optionally renaming it.
    CopyPropertyToRelativePath {
        name: String,
        new_name: Option<String>,
        relative_path: String,
    },
    MovePropertyToRelativePath {
        name: String,
        new_name: Option<String>,
        relative_path: String,
    },
    ReplaceValue {
        search: String,
        replacement: String,
        scope: PropertyScope,
    },
    ReplaceValueRegex {
        pattern: Pattern,
        replacement: String,
        scope: PropertyScope,
    },

    // === Multi-value properties ===
    AddValues {
        name: String,
        values: Vec<Value>,
    },
    RemoveValues {
        name: String,
        values: Vec<Value>,
    },
    /// Replace `old_values[i]` by `new_values[i]`; both have the same length.
    ReplaceValues {
        name: String,
        old_values: Vec<Value>,
        new_values: Vec<Value>,
    },

    // === Resources ===
    Rename {
        new_name: String,
    },
    /// Copy the node below the node at `relative_path`.
    CopyResourceToRelativePath {
        relative_path: String,
    },
    MoveResourceToRelativePath {
        relative_path: String,
    },
    /// Move the node below the parent obtained by replacing its path with
    /// `target` (group references allowed). Nodes whose path does not match
    /// are left alone.
    MoveResourceToPathRegex {
        pattern: Pattern,
        target: String,
    },
    DeleteResource,

    // === Pages ===
    ActivateContainingPage,
    DeactivateContainingPage,
    TreeActivateContainingPage {
        skip_deactivated: bool,
    },
    DeleteContainingPage,
    AddTagsToContainingPage {
        tags: Vec<String>,
    },
    SetTagsForContainingPage {
        tags: Vec<String>,
    },
    RemoveTagsFromContainingPage {
        tags: Vec<String>,
    },
    CheckPageRendering {
        expected_status: u16,
        text_present: Option<String>,
        text_absent: Option<String>,
    },

    // === Output ===
    PrintPath,
    PrintProperty {
        name: String,
    },
    PrintJson,

    Custom(Arc<dyn CustomAction>),
}

impl Action {
    pub fn custom(action: impl CustomAction + 'static) -> Self {
        Action::Custom(Arc::new(action))
    }

    /// Apply the action to one node.
    pub fn apply(&self, node: &Node, ctx: &mut RunContext<'_>) -> Result<ActionResult> {
        match self {
            Action::SetProperty { name, value } => properties::set(node, ctx, name, value),
            Action::DeleteProperty { name } => properties::delete(node, ctx, name),
            Action::RenameProperty { old_name, new_name } => {
                properties::rename(node, ctx, old_name, new_name)
            }
            Action::CopyPropertyToRelativePath {
                name,
                new_name,
                relative_path,
            } => properties::transfer(node, ctx, name, new_name.as_deref(), relative_path, false),
            Action::MovePropertyToRelativePath {
                name,
                new_name,
                relative_path,
            } => properties::transfer(node, ctx, name, new_name.as_deref(), relative_path, true),
            Action::ReplaceValue {
                search,
                replacement,
                scope,
            } => properties::replace_value(node, ctx, scope, search, |s| {
                s.replace(search.as_str(), replacement)
            }),
            Action::ReplaceValueRegex {
                pattern,
                replacement,
                scope,
            } => properties::replace_value(node, ctx, scope, pattern.as_str(), |s| {
                pattern.replace_all(s, replacement)
            }),

            Action::AddValues { name, values } => multivalue::add(node, ctx, name, values),
            Action::RemoveValues { name, values } => multivalue::remove(node, ctx, name, values),
            Action::ReplaceValues {
                name,
                old_values,
                new_values,
            } => multivalue::replace(node, ctx, name, old_values, new_values),

            Action::Rename { new_name } => resource::rename(node, ctx, new_name),
            Action::CopyResourceToRelativePath { relative_path } => {
                resource::relocate_relative(node, ctx, relative_path, false)
            }
            Action::MoveResourceToRelativePath { relative_path } => {
                resource::relocate_relative(node, ctx, relative_path, true)
            }
            Action::MoveResourceToPathRegex { pattern, target } => {
                resource::move_by_pattern(node, ctx, pattern, target)
            }
            Action::DeleteResource => resource::delete(node, ctx),

            Action::ActivateContainingPage => {
                page::replicate(node, ctx, crate::services::ReplicationAction::Activate)
            }
            Action::DeactivateContainingPage => {
                page::replicate(node, ctx, crate::services::ReplicationAction::Deactivate)
            }
            Action::TreeActivateContainingPage { skip_deactivated } => {
                page::tree_activate(node, ctx, *skip_deactivated)
            }
            Action::DeleteContainingPage => page::delete(node, ctx),
            Action::AddTagsToContainingPage { tags } => {
                page::update_tags(node, ctx, page::TagUpdate::Add, tags)
            }
            Action::SetTagsForContainingPage { tags } => {
                page::update_tags(node, ctx, page::TagUpdate::Set, tags)
            }
            Action::RemoveTagsFromContainingPage { tags } => {
                page::update_tags(node, ctx, page::TagUpdate::Remove, tags)
            }
            Action::CheckPageRendering {
                expected_status,
                text_present,
                text_absent,
            } => page::check_rendering(
                node,
                ctx,
                *expected_status,
                text_present.as_deref(),
                text_absent.as_deref(),
            ),

            Action::PrintPath => Ok(print::path(node)),
            Action::PrintProperty { name } => Ok(print::property(node, name)),
            Action::PrintJson => print::json(node),

            Action::Custom(action) => action.apply(node, ctx),
        }
    }

    /// `true` for actions that may write to the store or publish pages.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Action::CheckPageRendering { .. }
                | Action::PrintPath
                | Action::PrintProperty { .. }
                | Action::PrintJson
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SetProperty { name, .. } => write!(f, "set_property({name})"),
            Action::DeleteProperty { name } => write!(f, "delete_property({name})"),
            Action::RenameProperty { old_name, new_name } => {
                write!(f, "rename_property({old_name} -> {new_name})")
            }
            Action::CopyPropertyToRelativePath {
                name, relative_path, ..
            } => write!(f, "copy_property({name} -> {relative_path})"),
            Action::MovePropertyToRelativePath {
                name, relative_path, ..
            } => write!(f, "move_property({name} -> {relative_path})"),
            Action::ReplaceValue { search, .. } => write!(f, "replace_value({search})"),
            Action::ReplaceValueRegex { pattern, .. } => {
                write!(f, "replace_value_regex({pattern})")
            }
            Action::AddValues { name, .. } => write!(f, "add_values({name})"),
            Action::RemoveValues { name, .. } => write!(f, "remove_values({name})"),
            Action::ReplaceValues { name, .. } => write!(f, "replace_values({name})"),
            Action::Rename { new_name } => write!(f, "rename({new_name})"),
            Action::CopyResourceToRelativePath { relative_path } => {
                write!(f, "copy_resource({relative_path})")
            }
            Action::MoveResourceToRelativePath { relative_path } => {
                write!(f, "move_resource({relative_path})")
            }
            Action::MoveResourceToPathRegex { pattern, target } => {
                write!(f, "move_resource_by_pattern({pattern} -> {target})")
            }
            Action::DeleteResource => write!(f, "delete_resource"),
            Action::ActivateContainingPage => write!(f, "activate_page"),
            Action::DeactivateContainingPage => write!(f, "deactivate_page"),
            Action::TreeActivateContainingPage { .. } => write!(f, "tree_activate_page"),
            Action::DeleteContainingPage => write!(f, "delete_page"),
            Action::AddTagsToContainingPage { .. } => write!(f, "add_tags"),
            Action::SetTagsForContainingPage { .. } => write!(f, "set_tags"),
            Action::RemoveTagsFromContainingPage { .. } => write!(f, "remove_tags"),
            Action::CheckPageRendering { .. } => write!(f, "check_page_rendering"),
            Action::PrintPath => write!(f, "print_path"),
            Action::PrintProperty { name } => write!(f, "print_property({name})"),
            Action::PrintJson => write!(f, "print_json"),
            Action::Custom(action) => write!(f, "custom({})", action.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
