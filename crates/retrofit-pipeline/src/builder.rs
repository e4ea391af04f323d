//! Fluent, staged construction of a [`MigrationPlan`].
//!
//! Every method consumes the builder and returns it, so a partially built
//! pipeline can be cloned and extended independently. Nothing touches a store
//! here; invalid patterns and inconsistent arguments are collected and
//! reported together by [`MigrationBuilder::build`].

use std::collections::BTreeMap;

use retrofit_store::QueryLanguage;
use retrofit_types::{ActionResult, Node, Result, RetrofitError, Value};

use crate::actions::{Action, CustomAction, FnAction, PropertyScope};
use crate::context::RunContext;
use crate::filter::{Filter, FnPredicate, NodePredicate};
use crate::pattern::Pattern;
use crate::plan::MigrationPlan;
use crate::traversal::Traversal;

/// Status expected by [`MigrationBuilder::do_check_page_rendering`].
pub const DEFAULT_RENDER_STATUS: u16 = 200;

#[derive(Debug, Clone, Default)]
pub struct MigrationBuilder {
    traversals: Vec<Traversal>,
    filter: Option<Filter>,
    actions: Vec<Action>,
    errors: Vec<String>,
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

fn values<I, V>(items: I) -> Vec<Value>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    items.into_iter().map(Into::into).collect()
}

impl MigrationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Traversals ----

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        tracing::debug!(%traversal, "Traversal added");
        self.traversals.push(traversal);
        self
    }

    pub fn for_resources<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_traversal(Traversal::Resources(strings(paths)))
    }

    pub fn for_child_resources_of(self, path: impl Into<String>) -> Self {
        self.with_traversal(Traversal::ChildrenOf(path.into()))
    }

    /// All descendants of `path`, excluding `path` itself.
    pub fn for_descendant_resources_of(self, path: impl Into<String>) -> Self {
        self.with_traversal(Traversal::Descendants {
            path: path.into(),
            include_root: false,
            max_depth: None,
        })
    }

    /// Descendants of `path` at most `max_depth` levels down.
    pub fn for_descendant_resources_of_bounded(
        self,
        path: impl Into<String>,
        max_depth: usize,
    ) -> Self {
        self.with_traversal(Traversal::Descendants {
            path: path.into(),
            include_root: false,
            max_depth: Some(max_depth),
        })
    }

    /// `path` and all of its descendants.
    pub fn for_resources_in_subtree(self, path: impl Into<String>) -> Self {
        self.with_traversal(Traversal::Descendants {
            path: path.into(),
            include_root: true,
            max_depth: None,
        })
    }

    pub fn for_resources_by_sql2_query(self, statement: impl Into<String>) -> Self {
        self.for_resources_by_query(statement, QueryLanguage::Sql2)
    }

    pub fn for_resources_by_query(
        self,
        statement: impl Into<String>,
        language: QueryLanguage,
    ) -> Self {
        self.with_traversal(Traversal::Query {
            statement: statement.into(),
            language,
        })
    }

    // ---- Filters ----

    /// Add a filter. A second filter folds into a conjunction with the first;
    /// further filters extend that conjunction.
    pub fn filter_with(mut self, filter: Filter) -> Self {
        tracing::debug!(%filter, "Filter added");
        self.filter = Some(match self.filter.take() {
            None => filter,
            Some(existing) => existing.and_with(filter),
        });
        self
    }

    pub fn filter_with_predicate(self, predicate: impl NodePredicate + 'static) -> Self {
        self.filter_with(Filter::custom(predicate))
    }

    pub fn filter_with_fn<F>(self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Node) -> bool + Send + Sync + 'static,
    {
        self.filter_with(Filter::custom(FnPredicate::new(name, predicate)))
    }

    /// Every condition must hold; a `None` value requires the property to be
    /// absent.
    pub fn filter_by_properties<I, S>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<Value>)>,
        S: Into<String>,
    {
        let conditions: BTreeMap<String, Option<Value>> =
            conditions.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.filter_with(Filter::Properties(conditions))
    }

    pub fn filter_by_property(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter_with(Filter::Property {
            name: name.into(),
            value: Some(value.into()),
        })
    }

    pub fn filter_by_property_absent(self, name: impl Into<String>) -> Self {
        self.filter_with(Filter::Property {
            name: name.into(),
            value: None,
        })
    }

    pub fn filter_by_has_property(self, name: impl Into<String>) -> Self {
        self.filter_with(Filter::HasProperty(name.into()))
    }

    pub fn filter_by_multi_value_prop_contains<I, V>(
        self,
        name: impl Into<String>,
        values_: I,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter_with(Filter::MultiValueContains {
            name: name.into(),
            values: values(values_),
        })
    }

    pub fn filter_by_node_name(self, name: impl Into<String>) -> Self {
        self.filter_with(Filter::NodeName(name.into()))
    }

    /// The regex must match the whole node name.
    pub fn filter_by_node_name_regex(self, regex: &str) -> Self {
        match Filter::node_name_regex(regex) {
            Ok(filter) => self.filter_with(filter),
            Err(e) => self.stage_error(e),
        }
    }

    /// The regex must match the whole node path.
    pub fn filter_by_path_regex(self, regex: &str) -> Self {
        match Filter::path_regex(regex) {
            Ok(filter) => self.filter_with(filter),
            Err(e) => self.stage_error(e),
        }
    }

    // ---- Actions ----

    pub fn with_action(mut self, action: Action) -> Self {
        tracing::debug!(%action, "Action added");
        self.actions.push(action);
        self
    }

    pub fn do_set_property(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_action(Action::SetProperty {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn do_delete_property(self, name: impl Into<String>) -> Self {
        self.with_action(Action::DeleteProperty { name: name.into() })
    }

    pub fn do_rename_property(
        self,
        old_name: impl Into<String>,
        new_name: impl Into<String>,
    ) -> Self {
        self.with_action(Action::RenameProperty {
            old_name: old_name.into(),
            new_name: new_name.into(),
        })
    }

    /// Copy a property to the node at `relative_path`, keeping its name
    /// unless `new_name` is given.
    pub fn do_copy_property_to_relative_path(
        self,
        name: impl Into<String>,
        new_name: Option<&str>,
        relative_path: impl Into<String>,
    ) -> Self {
        self.with_action(Action::CopyPropertyToRelativePath {
            name: name.into(),
            new_name: new_name.map(str::to_string),
            relative_path: relative_path.into(),
        })
    }

    pub fn do_move_property_to_relative_path(
        self,
        name: impl Into<String>,
        new_name: Option<&str>,
        relative_path: impl Into<String>,
    ) -> Self {
        self.with_action(Action::MovePropertyToRelativePath {
            name: name.into(),
            new_name: new_name.map(str::to_string),
            relative_path: relative_path.into(),
        })
    }

    pub fn do_add_values_to_multi_value_property<I, V>(
        self,
        name: impl Into<String>,
        values_: I,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with_action(Action::AddValues {
            name: name.into(),
            values: values(values_),
        })
    }

    pub fn do_remove_values_of_multi_value_property<I, V>(
        self,
        name: impl Into<String>,
        values_: I,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with_action(Action::RemoveValues {
            name: name.into(),
            values: values(values_),
        })
    }

    /// Replace each of `old_values` by the value at the same position in
    /// `new_values`. Both lists must have the same length.
    pub fn do_replace_values_of_multi_value_property<I, J, V, W>(
        self,
        name: impl Into<String>,
        old_values: I,
        new_values: J,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        J: IntoIterator<Item = W>,
        V: Into<Value>,
        W: Into<Value>,
    {
        let name = name.into();
        let old_values = values(old_values);
        let new_values = values(new_values);
        if old_values.len() != new_values.len() {
            return self.stage_error(RetrofitError::InvalidPlan(format!(
                "replace values of {name}: {} old value(s) but {} new value(s)",
                old_values.len(),
                new_values.len()
            )));
        }
        self.with_action(Action::ReplaceValues {
            name,
            old_values,
            new_values,
        })
    }

    pub fn do_replace_value_in_all_properties(
        self,
        search: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        self.replace_value(search.into(), replacement.into(), PropertyScope::All)
    }

    pub fn do_replace_value_in_properties<I, S>(
        self,
        search: impl Into<String>,
        replacement: impl Into<String>,
        property_names: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace_value(
            search.into(),
            replacement.into(),
            PropertyScope::Named(strings(property_names)),
        )
    }

    fn replace_value(self, search: String, replacement: String, scope: PropertyScope) -> Self {
        if search.is_empty() {
            return self.stage_error(RetrofitError::InvalidPlan(
                "replace value: search text must not be empty".into(),
            ));
        }
        self.with_action(Action::ReplaceValue {
            search,
            replacement,
            scope,
        })
    }

    /// `replacement` may reference capture groups as `$1` or `${name}`.
    pub fn do_replace_value_in_all_properties_regex(
        self,
        search_regex: &str,
        replacement: impl Into<String>,
    ) -> Self {
        self.replace_value_regex(search_regex, replacement.into(), PropertyScope::All)
    }

    pub fn do_replace_value_in_properties_regex<I, S>(
        self,
        search_regex: &str,
        replacement: impl Into<String>,
        property_names: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace_value_regex(
            search_regex,
            replacement.into(),
            PropertyScope::Named(strings(property_names)),
        )
    }

    fn replace_value_regex(
        self,
        search_regex: &str,
        replacement: String,
        scope: PropertyScope,
    ) -> Self {
        match Pattern::new(search_regex) {
            Ok(pattern) => self.with_action(Action::ReplaceValueRegex {
                pattern,
                replacement,
                scope,
            }),
            Err(e) => self.stage_error(e),
        }
    }

    pub fn do_rename(self, new_name: impl Into<String>) -> Self {
        self.with_action(Action::Rename {
            new_name: new_name.into(),
        })
    }

    /// Copy the node below the node at `relative_path`.
    pub fn do_copy_resource_to_relative_path(self, relative_path: impl Into<String>) -> Self {
        self.with_action(Action::CopyResourceToRelativePath {
            relative_path: relative_path.into(),
        })
    }

    /// Move the node below the node at `relative_path`.
    pub fn do_move_resource_to_relative_path(self, relative_path: impl Into<String>) -> Self {
        self.with_action(Action::MoveResourceToRelativePath {
            relative_path: relative_path.into(),
        })
    }

    /// Move nodes whose whole path matches `match_pattern` below the parent
    /// path obtained by substituting into `target_path_expr`.
    pub fn do_move_resource_to_path_regex(
        self,
        match_pattern: &str,
        target_path_expr: impl Into<String>,
    ) -> Self {
        match Pattern::whole(match_pattern) {
            Ok(pattern) => self.with_action(Action::MoveResourceToPathRegex {
                pattern,
                target: target_path_expr.into(),
            }),
            Err(e) => self.stage_error(e),
        }
    }

    pub fn do_delete_resource(self) -> Self {
        self.with_action(Action::DeleteResource)
    }

    pub fn do_custom(self, action: impl CustomAction + 'static) -> Self {
        self.with_action(Action::custom(action))
    }

    pub fn do_custom_fn<F>(self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Node, &mut RunContext<'_>) -> Result<ActionResult> + Send + Sync + 'static,
    {
        self.with_action(Action::custom(FnAction::new(name, action)))
    }

    pub fn do_activate_containing_page(self) -> Self {
        self.with_action(Action::ActivateContainingPage)
    }

    pub fn do_deactivate_containing_page(self) -> Self {
        self.with_action(Action::DeactivateContainingPage)
    }

    /// Activate the containing page and every page below it, optionally
    /// leaving out pages that were last deactivated.
    pub fn do_tree_activate_containing_page(self, skip_deactivated: bool) -> Self {
        self.with_action(Action::TreeActivateContainingPage { skip_deactivated })
    }

    pub fn do_delete_containing_page(self) -> Self {
        self.with_action(Action::DeleteContainingPage)
    }

    pub fn do_add_tags_to_containing_page<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_action(Action::AddTagsToContainingPage { tags: strings(tags) })
    }

    pub fn do_set_tags_for_containing_page<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_action(Action::SetTagsForContainingPage { tags: strings(tags) })
    }

    pub fn do_remove_tags_from_containing_page<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_action(Action::RemoveTagsFromContainingPage { tags: strings(tags) })
    }

    /// Expect the containing page to render with status 200.
    pub fn do_check_page_rendering(self) -> Self {
        self.do_check_page_rendering_status(DEFAULT_RENDER_STATUS)
    }

    pub fn do_check_page_rendering_status(self, expected_status: u16) -> Self {
        self.with_action(Action::CheckPageRendering {
            expected_status,
            text_present: None,
            text_absent: None,
        })
    }

    /// Expect status 200, `text_present` in the body and, if given,
    /// `text_absent` not in the body.
    pub fn do_check_page_rendering_text(
        self,
        text_present: impl Into<String>,
        text_absent: Option<&str>,
    ) -> Self {
        self.with_action(Action::CheckPageRendering {
            expected_status: DEFAULT_RENDER_STATUS,
            text_present: Some(text_present.into()),
            text_absent: text_absent.map(str::to_string),
        })
    }

    pub fn print_path(self) -> Self {
        self.with_action(Action::PrintPath)
    }

    pub fn print_property(self, name: impl Into<String>) -> Self {
        self.with_action(Action::PrintProperty { name: name.into() })
    }

    pub fn print_json(self) -> Self {
        self.with_action(Action::PrintJson)
    }

    // ---- Finalization ----

    fn stage_error(mut self, error: RetrofitError) -> Self {
        tracing::debug!(%error, "Builder error staged");
        self.errors.push(error.to_string());
        self
    }

    /// Finalize into an immutable plan, or report every staged error.
    pub fn build(self) -> Result<MigrationPlan> {
        if !self.errors.is_empty() {
            return Err(RetrofitError::InvalidPlan(self.errors.join("; ")));
        }
        Ok(MigrationPlan {
            traversals: self.traversals,
            filter: self.filter,
            actions: self.actions,
        })
    }
}
