use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::path;

/// Property name holding a node's primary type.
pub const PRIMARY_TYPE: &str = "jcr:primaryType";

/// A property value: a scalar or a multi-value list of scalars.
///
/// Deserialized untagged so that plain JSON (`"a"`, `42`, `1.5`, `true`,
/// `["a", "b"]`) maps directly onto the matching variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Long(i64),
    Double(f64),
    String(String),
    Multi(Vec<Value>),
}

impl Value {
    pub fn is_multi(&self) -> bool {
        matches!(self, Value::Multi(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The values of a multi-value property, or the scalar as a one-element slice.
    pub fn values(&self) -> &[Value] {
        match self {
            Value::Multi(values) => values,
            scalar => std::slice::from_ref(scalar),
        }
    }

    /// Build a multi-value from anything string-like.
    pub fn multi<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Multi(values.into_iter().map(|s| Value::String(s.into())).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Long(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Multi(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Long(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Multi(values)
    }
}

/// Property map of a node, ordered by name for deterministic output.
pub type Properties = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Snapshot of one entry of the hierarchical store.
///
/// The store owns the real node; a `Node` is what a traversal hands to filters
/// and actions. Children are enumerated through the store, not carried here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub path: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Node {
    pub fn new(path: impl Into<String>, properties: Properties) -> Self {
        Self {
            path: path.into(),
            properties,
        }
    }

    /// Last path segment; empty for the root node.
    pub fn name(&self) -> &str {
        path::name(&self.path)
    }

    pub fn parent_path(&self) -> Option<&str> {
        path::parent(&self.path)
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn primary_type(&self) -> Option<&str> {
        self.property(PRIMARY_TYPE).and_then(Value::as_str)
    }
}
