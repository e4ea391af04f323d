//! JSON plan files.
//!
//! A plan file declares traversals, filters and actions as arrays of objects
//! tagged by `"type"`:
//!
//! ```json
//! {
//!   "traversals": [{ "type": "children_of", "path": "/content/site" }],
//!   "filters":    [{ "type": "has_property", "name": "jcr:title" }],
//!   "actions":    [{ "type": "set_property", "name": "migrated", "value": true }]
//! }
//! ```
//!
//! Filters are combined by conjunction in file order. Custom actions and
//! predicates exist only in code and have no file form.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use retrofit_store::QueryLanguage;
use retrofit_types::{Result, RetrofitError, Value};

use crate::actions::Action;
use crate::builder::{MigrationBuilder, DEFAULT_RENDER_STATUS};
use crate::filter::Filter;
use crate::plan::MigrationPlan;
use crate::traversal::Traversal;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanFile {
    #[serde(default)]
    pub traversals: Vec<TraversalSpec>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

// ---------------------------------------------------------------------------
// Traversals
// ---------------------------------------------------------------------------

fn default_language() -> QueryLanguage {
    QueryLanguage::Sql2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraversalSpec {
    Resources {
        paths: Vec<String>,
    },
    ChildrenOf {
        path: String,
    },
    Descendants {
        path: String,
        #[serde(default)]
        max_depth: Option<usize>,
    },
    Subtree {
        path: String,
    },
    Query {
        statement: String,
        #[serde(default = "default_language")]
        language: QueryLanguage,
    },
}

impl From<TraversalSpec> for Traversal {
    fn from(spec: TraversalSpec) -> Self {
        match spec {
            TraversalSpec::Resources { paths } => Traversal::Resources(paths),
            TraversalSpec::ChildrenOf { path } => Traversal::ChildrenOf(path),
            TraversalSpec::Descendants { path, max_depth } => Traversal::Descendants {
                path,
                include_root: false,
                max_depth,
            },
            TraversalSpec::Subtree { path } => Traversal::Descendants {
                path,
                include_root: true,
                max_depth: None,
            },
            TraversalSpec::Query {
                statement,
                language,
            } => Traversal::Query {
                statement,
                language,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterSpec {
    HasProperty {
        name: String,
    },
    /// A missing or `null` value requires the property to be absent.
    Property {
        name: String,
        #[serde(default)]
        value: Option<Value>,
    },
    Properties {
        conditions: BTreeMap<String, Option<Value>>,
    },
    MultiValueContains {
        name: String,
        values: Vec<Value>,
    },
    NodeName {
        name: String,
    },
    NodeNameRegex {
        pattern: String,
    },
    PathRegex {
        pattern: String,
    },
    And {
        filters: Vec<FilterSpec>,
    },
    Or {
        filters: Vec<FilterSpec>,
    },
    Not {
        filter: Box<FilterSpec>,
    },
}

impl FilterSpec {
    pub fn into_filter(self) -> Result<Filter> {
        Ok(match self {
            FilterSpec::HasProperty { name } => Filter::HasProperty(name),
            FilterSpec::Property { name, value } => Filter::Property { name, value },
            FilterSpec::Properties { conditions } => Filter::Properties(conditions),
            FilterSpec::MultiValueContains { name, values } => {
                Filter::MultiValueContains { name, values }
            }
            FilterSpec::NodeName { name } => Filter::NodeName(name),
            FilterSpec::NodeNameRegex { pattern } => Filter::node_name_regex(&pattern)?,
            FilterSpec::PathRegex { pattern } => Filter::path_regex(&pattern)?,
            FilterSpec::And { filters } => composite("and", filters, Filter::And)?,
            FilterSpec::Or { filters } => composite("or", filters, Filter::Or)?,
            FilterSpec::Not { filter } => Filter::Not(Box::new(filter.into_filter()?)),
        })
    }
}

/// A single-member composite collapses to its member.
fn composite(
    kind: &str,
    specs: Vec<FilterSpec>,
    wrap: fn(Vec<Filter>) -> Filter,
) -> Result<Filter> {
    let mut members = specs
        .into_iter()
        .map(FilterSpec::into_filter)
        .collect::<Result<Vec<_>>>()?;
    match members.len() {
        0 => Err(RetrofitError::InvalidPlan(format!("'{kind}' filter needs at least one member"))),
        1 => Ok(members.remove(0)),
        _ => Ok(wrap(members)),
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

fn default_status() -> u16 {
    DEFAULT_RENDER_STATUS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionSpec {
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
    CopyProperty {
        name: String,
        #[serde(default)]
        new_name: Option<String>,
        relative_path: String,
    },
    MoveProperty {
        name: String,
        #[serde(default)]
        new_name: Option<String>,
        relative_path: String,
    },
    AddValues {
        name: String,
        values: Vec<Value>,
    },
    RemoveValues {
        name: String,
        values: Vec<Value>,
    },
    ReplaceValues {
        name: String,
        old_values: Vec<Value>,
        new_values: Vec<Value>,
    },
    /// An empty `properties` list means every property.
    ReplaceValue {
        search: String,
        replacement: String,
        #[serde(default)]
        properties: Vec<String>,
    },
    ReplaceValueRegex {
        pattern: String,
        replacement: String,
        #[serde(default)]
        properties: Vec<String>,
    },
    Rename {
        new_name: String,
    },
    CopyResource {
        relative_path: String,
    },
    MoveResource {
        relative_path: String,
    },
    MoveResourceByPattern {
        pattern: String,
        target: String,
    },
    DeleteResource,
    ActivatePage,
    DeactivatePage,
    TreeActivatePage {
        #[serde(default)]
        skip_deactivated: bool,
    },
    DeletePage,
    AddTags {
        tags: Vec<String>,
    },
    SetTags {
        tags: Vec<String>,
    },
    RemoveTags {
        tags: Vec<String>,
    },
    CheckPageRendering {
        #[serde(default = "default_status")]
        expected_status: u16,
        #[serde(default)]
        text_present: Option<String>,
        #[serde(default)]
        text_absent: Option<String>,
    },
    PrintPath,
    PrintProperty {
        name: String,
    },
    PrintJson,
}

impl ActionSpec {
    fn add_to(self, builder: MigrationBuilder) -> MigrationBuilder {
        match self {
            ActionSpec::SetProperty { name, value } => builder.do_set_property(name, value),
            ActionSpec::DeleteProperty { name } => builder.do_delete_property(name),
            ActionSpec::RenameProperty { old_name, new_name } => {
                builder.do_rename_property(old_name, new_name)
            }
            ActionSpec::CopyProperty {
                name,
                new_name,
                relative_path,
            } => {
                builder.do_copy_property_to_relative_path(name, new_name.as_deref(), relative_path)
            }
            ActionSpec::MoveProperty {
                name,
                new_name,
                relative_path,
            } => {
                builder.do_move_property_to_relative_path(name, new_name.as_deref(), relative_path)
            }
            ActionSpec::AddValues { name, values } => {
                builder.do_add_values_to_multi_value_property(name, values)
            }
            ActionSpec::RemoveValues { name, values } => {
                builder.do_remove_values_of_multi_value_property(name, values)
            }
            ActionSpec::ReplaceValues {
                name,
                old_values,
                new_values,
            } => builder.do_replace_values_of_multi_value_property(name, old_values, new_values),
            ActionSpec::ReplaceValue {
                search,
                replacement,
                properties,
            } if properties.is_empty() => {
                builder.do_replace_value_in_all_properties(search, replacement)
            }
            ActionSpec::ReplaceValue {
                search,
                replacement,
                properties,
            } => builder.do_replace_value_in_properties(search, replacement, properties),
            ActionSpec::ReplaceValueRegex {
                pattern,
                replacement,
                properties,
            } if properties.is_empty() => {
                builder.do_replace_value_in_all_properties_regex(&pattern, replacement)
            }
            ActionSpec::ReplaceValueRegex {
                pattern,
                replacement,
                properties,
            } => builder.do_replace_value_in_properties_regex(&pattern, replacement, properties),
            ActionSpec::Rename { new_name } => builder.do_rename(new_name),
            ActionSpec::CopyResource { relative_path } => {
                builder.do_copy_resource_to_relative_path(relative_path)
            }
            ActionSpec::MoveResource { relative_path } => {
                builder.do_move_resource_to_relative_path(relative_path)
            }
            ActionSpec::MoveResourceByPattern { pattern, target } => {
                builder.do_move_resource_to_path_regex(&pattern, target)
            }
            ActionSpec::DeleteResource => builder.do_delete_resource(),
            ActionSpec::ActivatePage => builder.do_activate_containing_page(),
            ActionSpec::DeactivatePage => builder.do_deactivate_containing_page(),
            ActionSpec::TreeActivatePage { skip_deactivated } => {
                builder.do_tree_activate_containing_page(skip_deactivated)
            }
            ActionSpec::DeletePage => builder.do_delete_containing_page(),
            ActionSpec::AddTags { tags } => builder.do_add_tags_to_containing_page(tags),
            ActionSpec::SetTags { tags } => builder.do_set_tags_for_containing_page(tags),
            ActionSpec::RemoveTags { tags } => builder.do_remove_tags_from_containing_page(tags),
            ActionSpec::CheckPageRendering {
                expected_status,
                text_present,
                text_absent,
            } => builder.with_action(Action::CheckPageRendering {
                expected_status,
                text_present,
                text_absent,
            }),
            ActionSpec::PrintPath => builder.print_path(),
            ActionSpec::PrintProperty { name } => builder.print_property(name),
            ActionSpec::PrintJson => builder.print_json(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl PlanFile {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Replay the file into a builder, in file order.
    pub fn into_builder(self) -> Result<MigrationBuilder> {
        let mut builder = MigrationBuilder::new();
        for traversal in self.traversals {
            builder = builder.with_traversal(traversal.into());
        }
        for filter in self.filters {
            builder = builder.filter_with(filter.into_filter()?);
        }
        for action in self.actions {
            builder = action.add_to(builder);
        }
        Ok(builder)
    }

    pub fn into_plan(self) -> Result<MigrationPlan> {
        self.into_builder()?.build()
    }
}

/// Read and build a plan from a JSON plan file.
pub fn load_plan(file: impl AsRef<Path>) -> Result<MigrationPlan> {
    let file = file.as_ref();
    let text = std::fs::read_to_string(file)?;
    let plan = PlanFile::from_json_str(&text)?.into_plan()?;
    tracing::debug!(
        file = %file.display(),
        traversals = plan.traversals().len(),
        actions = plan.actions().len(),
        "Plan loaded"
    );
    Ok(plan)
}
