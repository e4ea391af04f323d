//! Content store boundary and an in-memory reference implementation.
//!
//! [`ContentStore`] is everything the migration pipeline needs from a
//! hierarchical store: path lookup, child/descendant enumeration, queries,
//! property and structure writes, and a single `commit` that publishes all
//! pending writes. [`MemoryStore`] implements it over an in-memory tree with
//! staged writes, and can load and save content trees as JSON.

pub mod json;
pub mod memory;
pub mod sql2;

use std::fmt;

use serde::{Deserialize, Serialize};

use retrofit_types::{Node, Properties, Result, RetrofitError, Value};

pub use memory::MemoryStore;

/// Query languages a traversal can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryLanguage {
    Sql2,
    XPath,
}

impl fmt::Display for QueryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryLanguage::Sql2 => write!(f, "JCR-SQL2"),
            QueryLanguage::XPath => write!(f, "xpath"),
        }
    }
}

/// Abstraction over the hierarchical store a migration runs against.
///
/// Reads observe pending (uncommitted) writes. Errors for which
/// [`RetrofitError::is_fatal`] returns `true` mean the store is unusable.
pub trait ContentStore {
    /// Look up a node by absolute path.
    fn get(&self, path: &str) -> Result<Option<Node>>;

    /// Immediate children of `path` in store order. Fails with
    /// `PathNotFound` when `path` does not exist.
    fn children(&self, path: &str) -> Result<Vec<Node>>;

    /// Execute a query and return matching nodes in store order.
    fn query(&self, statement: &str, language: QueryLanguage) -> Result<Vec<Node>>;

    fn set_property(&mut self, path: &str, name: &str, value: Value) -> Result<()>;

    /// Remove a property, returning its previous value if it was set.
    fn remove_property(&mut self, path: &str, name: &str) -> Result<Option<Value>>;

    /// Create a node; the parent must exist and the path must be free.
    fn create_node(&mut self, path: &str, properties: Properties) -> Result<()>;

    /// Copy the subtree at `path` below `dest_parent`, keeping its name.
    /// Returns the path of the copy.
    fn copy_node(&mut self, path: &str, dest_parent: &str) -> Result<String>;

    /// Move the subtree at `path` below `dest_parent`, keeping its name.
    /// Returns the new path.
    fn move_node(&mut self, path: &str, dest_parent: &str) -> Result<String>;

    /// Rename a node in place. Returns the new path.
    fn rename_node(&mut self, path: &str, new_name: &str) -> Result<String>;

    /// Delete the subtree at `path`.
    fn delete_node(&mut self, path: &str) -> Result<()>;

    fn has_pending_changes(&self) -> bool;

    /// Durably persist all pending writes since the last commit.
    fn commit(&mut self) -> Result<()>;

    /// Discard all pending writes.
    fn revert(&mut self);

    /// All nodes below `path` in depth-first pre-order, optionally including
    /// `path` itself and optionally bounded by `max_depth` (1 = children only).
    fn descendants(
        &self,
        path: &str,
        include_root: bool,
        max_depth: Option<usize>,
    ) -> Result<Vec<Node>> {
        let root = self
            .get(path)?
            .ok_or_else(|| RetrofitError::PathNotFound {
                path: path.to_string(),
            })?;
        let mut nodes = Vec::new();
        if include_root {
            nodes.push(root);
        }
        collect_descendants(self, path, 1, max_depth, &mut nodes)?;
        Ok(nodes)
    }
}

fn collect_descendants<S: ContentStore + ?Sized>(
    store: &S,
    path: &str,
    depth: usize,
    max_depth: Option<usize>,
    out: &mut Vec<Node>,
) -> Result<()> {
    if max_depth.is_some_and(|max| depth > max) {
        return Ok(());
    }
    for child in store.children(path)? {
        let child_path = child.path.clone();
        out.push(child);
        collect_descendants(store, &child_path, depth + 1, max_depth, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> MemoryStore {
        MemoryStore::from_json(&serde_json::json!({
            "content": {
                "site": {
                    "a": { "a1": {}, "a2": {} },
                    "b": {}
                }
            }
        }))
        .unwrap()
    }

    fn paths(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.path.as_str()).collect()
    }

    #[test]
    fn descendants_preorder_strict() {
        let store = sample_store();
        let nodes = store.descendants("/content/site", false, None).unwrap();
        assert_eq!(
            paths(&nodes),
            vec![
                "/content/site/a",
                "/content/site/a/a1",
                "/content/site/a/a2",
                "/content/site/b"
            ]
        );
    }

    #[test]
    fn descendants_including_root() {
        let store = sample_store();
        let nodes = store.descendants("/content/site/a", true, None).unwrap();
        assert_eq!(
            paths(&nodes),
            vec!["/content/site/a", "/content/site/a/a1", "/content/site/a/a2"]
        );
    }

    #[test]
    fn descendants_bounded_depth() {
        let store = sample_store();
        let nodes = store.descendants("/content/site", false, Some(1)).unwrap();
        assert_eq!(paths(&nodes), vec!["/content/site/a", "/content/site/b"]);

        let none = store.descendants("/content/site", false, Some(0)).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn descendants_of_missing_path_fails() {
        let store = sample_store();
        let err = store.descendants("/content/nope", false, None).unwrap_err();
        assert!(matches!(err, RetrofitError::PathNotFound { .. }));
    }

    #[test]
    fn query_language_display() {
        assert_eq!(QueryLanguage::Sql2.to_string(), "JCR-SQL2");
        assert_eq!(
            serde_json::to_string(&QueryLanguage::XPath).unwrap(),
            "\"xpath\""
        );
    }
}
