//! Node filters: built-in predicates, boolean composition, and the custom
//! predicate extension point.
//!
//! A plan holds at most one active filter. Adding another one folds it into a
//! conjunction with [`Filter::and_with`]: an active `And` is extended in place,
//! any other active filter becomes the first member of a new two-member `And`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use retrofit_types::{Node, Value};

use crate::pattern::Pattern;

// ---------------------------------------------------------------------------
// NodePredicate
// ---------------------------------------------------------------------------

/// Caller-supplied node predicate. Must not mutate anything.
pub trait NodePredicate: Send + Sync {
    fn name(&self) -> &str {
        "custom"
    }

    fn accepts(&self, node: &Node) -> bool;
}

impl fmt::Debug for dyn NodePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePredicate({})", self.name())
    }
}

/// Adapts a closure to [`NodePredicate`].
pub struct FnPredicate<F> {
    name: String,
    predicate: F,
}

impl<F> FnPredicate<F>
where
    F: Fn(&Node) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl<F> NodePredicate for FnPredicate<F>
where
    F: Fn(&Node) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, node: &Node) -> bool {
        (self.predicate)(node)
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Filter {
    /// The node has the property, whatever its value.
    HasProperty(String),
    /// The property equals `value`; with `None` the property must be absent.
    Property { name: String, value: Option<Value> },
    /// Every entry holds as a [`Filter::Property`] condition.
    Properties(BTreeMap<String, Option<Value>>),
    /// The (multi-value) property contains all of `values`.
    MultiValueContains { name: String, values: Vec<Value> },
    NodeName(String),
    NodeNameRegex(Pattern),
    PathRegex(Pattern),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Custom(Arc<dyn NodePredicate>),
}

impl Filter {
    /// Build a node-name filter whose regex must match the whole name.
    pub fn node_name_regex(pattern: &str) -> retrofit_types::Result<Self> {
        Ok(Filter::NodeNameRegex(Pattern::whole(pattern)?))
    }

    /// Build a path filter whose regex must match the whole path.
    pub fn path_regex(pattern: &str) -> retrofit_types::Result<Self> {
        Ok(Filter::PathRegex(Pattern::whole(pattern)?))
    }

    pub fn custom(predicate: impl NodePredicate + 'static) -> Self {
        Filter::Custom(Arc::new(predicate))
    }

    /// Fold `incoming` into this filter as an additional conjunct.
    pub fn and_with(self, incoming: Filter) -> Filter {
        match self {
            Filter::And(mut conjuncts) => {
                conjuncts.push(incoming);
                Filter::And(conjuncts)
            }
            existing => Filter::And(vec![existing, incoming]),
        }
    }

    /// Evaluate the filter against a node. Conjunctions stop at the first
    /// rejecting member, disjunctions at the first accepting one.
    pub fn accepts(&self, node: &Node) -> bool {
        match self {
            Filter::HasProperty(name) => node.has_property(name),
            Filter::Property { name, value } => property_matches(node, name, value.as_ref()),
            Filter::Properties(conditions) => conditions
                .iter()
                .all(|(name, value)| property_matches(node, name, value.as_ref())),
            Filter::MultiValueContains { name, values } => match node.property(name) {
                Some(actual) => {
                    let present = actual.values();
                    values.iter().all(|v| present.contains(v))
                }
                None => false,
            },
            Filter::NodeName(name) => node.name() == name,
            Filter::NodeNameRegex(pattern) => pattern.is_match(node.name()),
            Filter::PathRegex(pattern) => pattern.is_match(&node.path),
            Filter::And(conjuncts) => conjuncts.iter().all(|f| f.accepts(node)),
            Filter::Or(alternatives) => alternatives.iter().any(|f| f.accepts(node)),
            Filter::Not(inner) => !inner.accepts(node),
            Filter::Custom(predicate) => predicate.accepts(node),
        }
    }

    /// Number of direct members for composite filters, 1 otherwise.
    pub fn arity(&self) -> usize {
        match self {
            Filter::And(members) | Filter::Or(members) => members.len(),
            _ => 1,
        }
    }
}

fn property_matches(node: &Node, name: &str, expected: Option<&Value>) -> bool {
    match expected {
        None => !node.has_property(name),
        Some(expected) => node.property(name) == Some(expected),
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::HasProperty(name) => write!(f, "has_property({name})"),
            Filter::Property { name, value: Some(v) } => write!(f, "property({name} = {v})"),
            Filter::Property { name, value: None } => write!(f, "property({name} absent)"),
            Filter::Properties(conditions) => {
                write!(f, "properties(")?;
                for (i, (name, value)) in conditions.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match value {
                        Some(v) => write!(f, "{name} = {v}")?,
                        None => write!(f, "{name} absent")?,
                    }
                }
                write!(f, ")")
            }
            Filter::MultiValueContains { name, values } => {
                write!(f, "multi_value_contains({name}, {})", Value::Multi(values.clone()))
            }
            Filter::NodeName(name) => write!(f, "node_name({name})"),
            Filter::NodeNameRegex(p) => write!(f, "node_name_regex({p})"),
            Filter::PathRegex(p) => write!(f, "path_regex({p})"),
            Filter::And(members) => write_list(f, "and", members),
            Filter::Or(members) => write_list(f, "or", members),
            Filter::Not(inner) => write!(f, "not({inner})"),
            Filter::Custom(p) => write!(f, "custom({})", p.name()),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, op: &str, members: &[Filter]) -> fmt::Result {
    write!(f, "{op}[")?;
    for (i, member) in members.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{member}")?;
    }
    write!(f, "]")
}
