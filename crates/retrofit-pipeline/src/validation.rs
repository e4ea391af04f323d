//! Plan validation: lint rules and diagnostics.
//!
//! Seven built-in rules check a [`MigrationPlan`] for mistakes that would only
//! show up at run time as skipped traversals or failed actions. Call
//! [`validate`] for advisory diagnostics or [`validate_or_raise`] to fail on
//! any `Error`-severity issue.

use std::fmt;

use retrofit_store::QueryLanguage;
use retrofit_types::{path, RetrofitError};

use crate::actions::Action;
use crate::filter::Filter;
use crate::plan::MigrationPlan;
use crate::traversal::Traversal;

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    /// Display form of the offending traversal, if any.
    pub traversal: Option<String>,
    /// Display form of the offending action, if any.
    pub action: Option<String>,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.rule, self.message)?;
        if let Some(fix) = &self.fix {
            write!(f, " (fix: {fix})")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

pub trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, plan: &MigrationPlan) -> Vec<Diagnostic>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn traversal_paths(traversal: &Traversal) -> Vec<&str> {
    match traversal {
        Traversal::Resources(paths) => paths.iter().map(String::as_str).collect(),
        Traversal::ChildrenOf(path) => vec![path.as_str()],
        Traversal::Descendants { path, .. } => vec![path.as_str()],
        Traversal::Query { .. } => vec![],
    }
}

fn action_property_names(action: &Action) -> Vec<&str> {
    match action {
        Action::SetProperty { name, .. }
        | Action::DeleteProperty { name }
        | Action::AddValues { name, .. }
        | Action::RemoveValues { name, .. }
        | Action::ReplaceValues { name, .. }
        | Action::PrintProperty { name } => vec![name.as_str()],
        Action::RenameProperty { old_name, new_name } => {
            vec![old_name.as_str(), new_name.as_str()]
        }
        Action::CopyPropertyToRelativePath { name, new_name, .. }
        | Action::MovePropertyToRelativePath { name, new_name, .. } => {
            let mut names = vec![name.as_str()];
            names.extend(new_name.as_deref());
            names
        }
        _ => vec![],
    }
}

fn filter_property_names<'a>(filter: &'a Filter, names: &mut Vec<&'a str>) {
    match filter {
        Filter::HasProperty(name)
        | Filter::Property { name, .. }
        | Filter::MultiValueContains { name, .. } => names.push(name),
        Filter::Properties(conditions) => names.extend(conditions.keys().map(String::as_str)),
        Filter::And(members) | Filter::Or(members) => {
            for member in members {
                filter_property_names(member, names);
            }
        }
        Filter::Not(inner) => filter_property_names(inner, names),
        Filter::NodeName(_)
        | Filter::NodeNameRegex(_)
        | Filter::PathRegex(_)
        | Filter::Custom(_) => {}
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct NoTraversalRule;
impl LintRule for NoTraversalRule {
    fn name(&self) -> &str { "no_traversal" }
    fn apply(&self, plan: &MigrationPlan) -> Vec<Diagnostic> {
        if !plan.traversals().is_empty() {
            return vec![];
        }
        vec![Diagnostic {
            rule: self.name().into(),
            severity: Severity::Warning,
            message: "Plan has no traversal; no node will be visited".into(),
            traversal: None,
            action: None,
            fix: Some("Add a traversal such as for_child_resources_of".into()),
        }]
    }
}

struct NoActionRule;
impl LintRule for NoActionRule {
    fn name(&self) -> &str { "no_action" }
    fn apply(&self, plan: &MigrationPlan) -> Vec<Diagnostic> {
        if !plan.actions().is_empty() {
            return vec![];
        }
        vec![Diagnostic {
            rule: self.name().into(),
            severity: Severity::Warning,
            message: "Plan has no action; visited nodes will only be listed".into(),
            traversal: None,
            action: None,
            fix: Some("Add an action, or print_path to list nodes explicitly".into()),
        }]
    }
}

struct RelativeTraversalPathRule;
impl LintRule for RelativeTraversalPathRule {
    fn name(&self) -> &str { "relative_traversal_path" }
    fn apply(&self, plan: &MigrationPlan) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for traversal in plan.traversals() {
            for p in traversal_paths(traversal) {
                if let Err(e) = path::validate_absolute(p) {
                    diagnostics.push(Diagnostic {
                        rule: self.name().into(),
                        severity: Severity::Error,
                        message: e.to_string(),
                        traversal: Some(traversal.to_string()),
                        action: None,
                        fix: Some(format!(
                            "Use an absolute path such as '/{}'",
                            p.trim_start_matches('/')
                        )),
                    });
                }
            }
        }
        diagnostics
    }
}

struct EmptyPropertyNameRule;
impl LintRule for EmptyPropertyNameRule {
    fn name(&self) -> &str { "empty_property_name" }
    fn apply(&self, plan: &MigrationPlan) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for action in plan.actions() {
            if action_property_names(action).iter().any(|n| n.trim().is_empty()) {
                diagnostics.push(Diagnostic {
                    rule: self.name().into(),
                    severity: Severity::Error,
                    message: format!("Action {action} uses an empty property name"),
                    traversal: None,
                    action: Some(action.to_string()),
                    fix: Some("Give the property a name".into()),
                });
            }
        }
        if let Some(filter) = plan.filter() {
            let mut names = Vec::new();
            filter_property_names(filter, &mut names);
            if names.iter().any(|n| n.trim().is_empty()) {
                diagnostics.push(Diagnostic {
                    rule: self.name().into(),
                    severity: Severity::Error,
                    message: format!("Filter {filter} uses an empty property name"),
                    traversal: None,
                    action: None,
                    fix: Some("Give the property a name".into()),
                });
            }
        }
        diagnostics
    }
}

struct ZeroDepthRule;
impl LintRule for ZeroDepthRule {
    fn name(&self) -> &str { "zero_depth" }
    fn apply(&self, plan: &MigrationPlan) -> Vec<Diagnostic> {
        plan.traversals()
            .iter()
            .filter(|t| {
                matches!(
                    t,
                    Traversal::Descendants {
                        include_root: false,
                        max_depth: Some(0),
                        ..
                    }
                )
            })
            .map(|t| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!("Traversal {t} has depth 0 and yields nothing"),
                traversal: Some(t.to_string()),
                action: None,
                fix: Some("Use a depth of at least 1".into()),
            })
            .collect()
    }
}

struct UnsupportedQueryLanguageRule;
impl LintRule for UnsupportedQueryLanguageRule {
    fn name(&self) -> &str { "unsupported_query_language" }
    fn apply(&self, plan: &MigrationPlan) -> Vec<Diagnostic> {
        plan.traversals()
            .iter()
            .filter_map(|t| match t {
                Traversal::Query { language, .. } if *language != QueryLanguage::Sql2 => {
                    Some(Diagnostic {
                        rule: self.name().into(),
                        severity: Severity::Info,
                        message: format!(
                            "Query language {language} is not supported by the in-memory \
                             store; the traversal will be skipped there"
                        ),
                        traversal: Some(t.to_string()),
                        action: None,
                        fix: Some("Rewrite the query in JCR-SQL2".into()),
                    })
                }
                _ => None,
            })
            .collect()
    }
}

struct ReplaceValuesLengthRule;
impl LintRule for ReplaceValuesLengthRule {
    fn name(&self) -> &str { "replace_values_length" }
    fn apply(&self, plan: &MigrationPlan) -> Vec<Diagnostic> {
        plan.actions()
            .iter()
            .filter_map(|action| match action {
                Action::ReplaceValues {
                    old_values,
                    new_values,
                    ..
                } if old_values.len() != new_values.len() => Some(Diagnostic {
                    rule: self.name().into(),
                    severity: Severity::Error,
                    message: format!(
                        "Action {action} replaces {} value(s) with {} value(s)",
                        old_values.len(),
                        new_values.len()
                    ),
                    traversal: None,
                    action: Some(action.to_string()),
                    fix: Some("Give one new value for every old value".into()),
                }),
                _ => None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run all built-in lint rules and collect their diagnostics.
pub fn validate(plan: &MigrationPlan) -> Vec<Diagnostic> {
    let rules: Vec<Box<dyn LintRule>> = vec![
        Box::new(NoTraversalRule),
        Box::new(NoActionRule),
        Box::new(RelativeTraversalPathRule),
        Box::new(EmptyPropertyNameRule),
        Box::new(ZeroDepthRule),
        Box::new(UnsupportedQueryLanguageRule),
        Box::new(ReplaceValuesLengthRule),
    ];

    let mut diagnostics = Vec::new();
    for rule in &rules {
        diagnostics.extend(rule.apply(plan));
    }
    diagnostics
}

/// Run all lint rules; return `Err` if any `Error`-severity diagnostic found.
pub fn validate_or_raise(plan: &MigrationPlan) -> retrofit_types::Result<Vec<Diagnostic>> {
    let diagnostics = validate(plan);
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message.clone())
        .collect();
    if !errors.is_empty() {
        return Err(RetrofitError::InvalidPlan(errors.join("; ")));
    }
    Ok(diagnostics)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MigrationBuilder;

    fn rules_hit(plan: &MigrationPlan) -> Vec<(String, Severity)> {
        validate(plan).into_iter().map(|d| (d.rule, d.severity)).collect()
    }

    #[test]
    fn valid_plan_passes() {
        let plan = MigrationBuilder::new()
            .for_child_resources_of("/content/site")
            .filter_by_has_property("jcr:title")
            .do_set_property("migrated", true)
            .build()
            .unwrap();
        assert!(validate(&plan).is_empty());
        assert!(validate_or_raise(&plan).unwrap().is_empty());
    }

    #[test]
    fn empty_plan_warns_twice() {
        let plan = MigrationBuilder::new().build().unwrap();
        assert_eq!(
            rules_hit(&plan),
            vec![
                ("no_traversal".to_string(), Severity::Warning),
                ("no_action".to_string(), Severity::Warning)
            ]
        );
        // Warnings do not fail validation.
        assert_eq!(validate_or_raise(&plan).unwrap().len(), 2);
    }

    #[test]
    fn relative_path_is_error() {
        let plan = MigrationBuilder::new()
            .for_resources(["/content/a", "content/b"])
            .print_path()
            .build()
            .unwrap();
        let diags = validate(&plan);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].rule, "relative_traversal_path");
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].traversal.as_deref(), Some("for_resources([/content/a, content/b])"));

        let err = validate_or_raise(&plan).unwrap_err();
        assert!(matches!(err, RetrofitError::InvalidPlan(_)));
    }

    #[test]
    fn empty_property_names_are_errors() {
        let plan = MigrationBuilder::new()
            .for_child_resources_of("/content")
            .filter_by_has_property("")
            .do_rename_property("title", " ")
            .build()
            .unwrap();
        let hits = rules_hit(&plan);
        assert_eq!(hits.len(), 2);
        assert!(hits
            .iter()
            .all(|(rule, sev)| rule == "empty_property_name" && *sev == Severity::Error));
    }

    #[test]
    fn unequal_replace_values_is_error() {
        let plan = MigrationBuilder::new()
            .for_child_resources_of("/content")
            .with_action(Action::ReplaceValues {
                name: "tags".into(),
                old_values: vec!["x".into(), "y".into()],
                new_values: vec!["z".into()],
            })
            .build()
            .unwrap();
        let diags = validate(&plan);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].rule, "replace_values_length");
        assert_eq!(diags[0].action.as_deref(), Some("replace_values(tags)"));
        assert_eq!(
            diags[0].message,
            "Action replace_values(tags) replaces 2 value(s) with 1 value(s)"
        );
        assert!(validate_or_raise(&plan).is_err());
    }

    #[test]
    fn zero_depth_and_xpath() {
        let plan = MigrationBuilder::new()
            .for_descendant_resources_of_bounded("/content", 0)
            .for_resources_by_query("//element(*, cq:Page)", QueryLanguage::XPath)
            .print_path()
            .build()
            .unwrap();
        assert_eq!(
            rules_hit(&plan),
            vec![
                ("zero_depth".to_string(), Severity::Warning),
                ("unsupported_query_language".to_string(), Severity::Info)
            ]
        );
    }

    #[test]
    fn diagnostic_display() {
        let plan = MigrationBuilder::new().print_path().build().unwrap();
        let diags = validate(&plan);
        assert_eq!(
            diags[0].to_string(),
            "[warning] no_traversal: Plan has no traversal; no node will be visited \
             (fix: Add a traversal such as for_child_resources_of)"
        );
    }
}
