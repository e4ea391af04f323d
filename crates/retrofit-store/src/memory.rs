//! In-memory [`ContentStore`] with staged writes.
//!
//! Keeps a committed tree and a working tree. Reads and writes go to the
//! working tree; `commit` publishes it, `revert` throws it away. Children keep
//! insertion order, which is the store's enumeration order.

use std::collections::BTreeMap;
use std::collections::HashSet;

use retrofit_types::path;
use retrofit_types::{Node, Properties, Result, RetrofitError, Value};

use crate::{sql2, ContentStore, QueryLanguage};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Entry {
    pub(crate) properties: Properties,
    /// Child names in enumeration order.
    pub(crate) children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tree {
    entries: BTreeMap<String, Entry>,
}

impl Default for Tree {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("/".to_string(), Entry::default());
        Self { entries }
    }
}

impl Tree {
    pub(crate) fn entry(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    fn entry_mut(&mut self, path: &str) -> Result<&mut Entry> {
        self.entries
            .get_mut(path)
            .ok_or_else(|| RetrofitError::PathNotFound {
                path: path.to_string(),
            })
    }

    pub(crate) fn set_root_properties(&mut self, properties: Properties) {
        if let Some(root) = self.entries.get_mut("/") {
            root.properties = properties;
        }
    }

    pub(crate) fn node(&self, path: &str) -> Option<Node> {
        self.entries
            .get(path)
            .map(|e| Node::new(path, e.properties.clone()))
    }

    pub(crate) fn insert(&mut self, node_path: &str, properties: Properties) -> Result<()> {
        path::validate_absolute(node_path)?;
        let parent = path::parent(node_path).ok_or_else(|| RetrofitError::ItemExists {
            path: node_path.to_string(),
        })?;
        if self.entries.contains_key(node_path) {
            return Err(RetrofitError::ItemExists {
                path: node_path.to_string(),
            });
        }
        self.entry_mut(parent)?
            .children
            .push(path::name(node_path).to_string());
        self.entries.insert(
            node_path.to_string(),
            Entry {
                properties,
                children: Vec::new(),
            },
        );
        Ok(())
    }

    /// All paths of the subtree rooted at `root` in depth-first pre-order.
    pub(crate) fn subtree_paths(&self, root: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![root.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(entry) = self.entries.get(&current) {
                for child in entry.children.iter().rev() {
                    stack.push(path::join(&current, child));
                }
                out.push(current);
            }
        }
        out
    }

    fn detach(&mut self, node_path: &str) -> Vec<(String, Entry)> {
        let removed: Vec<(String, Entry)> = self
            .subtree_paths(node_path)
            .into_iter()
            .filter_map(|p| self.entries.remove(&p).map(|e| (p, e)))
            .collect();
        if let Some(parent) = path::parent(node_path) {
            if let Some(parent_entry) = self.entries.get_mut(parent) {
                let name = path::name(node_path);
                parent_entry.children.retain(|c| c != name);
            }
        }
        removed
    }

    fn attach(&mut self, from_root: &str, to_root: &str, subtree: Vec<(String, Entry)>) {
        for (old_path, entry) in subtree {
            let new_path = format!("{}{}", to_root, &old_path[from_root.len()..]);
            self.entries.insert(new_path, entry);
        }
    }

    fn cloned_subtree(&self, root: &str) -> Vec<(String, Entry)> {
        self.subtree_paths(root)
            .into_iter()
            .filter_map(|p| self.entries.get(&p).cloned().map(|e| (p, e)))
            .collect()
    }
}

/// In-memory hierarchical store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    committed: Tree,
    working: Tree,
    dirty: bool,
    protected: HashSet<String>,
    commit_calls: usize,
    commits: usize,
    fail_next_commit: Option<String>,
    disconnected: Option<String>,
}

impl MemoryStore {
    /// Create a store holding only the root node.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_tree(tree: Tree) -> Self {
        Self {
            committed: tree.clone(),
            working: tree,
            ..Self::default()
        }
    }

    pub(crate) fn committed_tree(&self) -> &Tree {
        &self.committed
    }

    /// Number of times `commit` was called, successful or not.
    pub fn commit_calls(&self) -> usize {
        self.commit_calls
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Read a node from the last committed state, ignoring pending writes.
    pub fn committed_node(&self, path: &str) -> Option<Node> {
        self.committed.node(path)
    }

    /// Reject writes to the node at `path` with a constraint violation.
    pub fn protect(&mut self, path: impl Into<String>) {
        self.protected.insert(path.into());
    }

    /// Make the next `commit` fail with `RetrofitError::Commit(message)`.
    pub fn fail_next_commit(&mut self, message: impl Into<String>) {
        self.fail_next_commit = Some(message.into());
    }

    /// Simulate a lost connection: every following call fails with
    /// `StoreUnavailable`.
    pub fn disconnect(&mut self, reason: impl Into<String>) {
        self.disconnected = Some(reason.into());
    }

    pub fn reconnect(&mut self) {
        self.disconnected = None;
    }

    fn ensure_connected(&self) -> Result<()> {
        match &self.disconnected {
            Some(reason) => Err(RetrofitError::StoreUnavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn ensure_writable(&self, node_path: &str) -> Result<()> {
        self.ensure_connected()?;
        if self
            .protected
            .iter()
            .any(|p| path::is_same_or_descendant(node_path, p))
        {
            return Err(RetrofitError::ConstraintViolation {
                path: node_path.to_string(),
                message: "node is protected".into(),
            });
        }
        Ok(())
    }

    fn ensure_exists(&self, node_path: &str) -> Result<()> {
        if self.working.entry(node_path).is_none() {
            return Err(RetrofitError::PathNotFound {
                path: node_path.to_string(),
            });
        }
        Ok(())
    }

    /// Validate a structural change of `source` to the new path `target`.
    fn check_relocation(&self, source: &str, target: &str) -> Result<()> {
        if source == "/" {
            return Err(RetrofitError::ConstraintViolation {
                path: source.to_string(),
                message: "the root node cannot be moved".into(),
            });
        }
        if path::is_same_or_descendant(target, source) {
            return Err(RetrofitError::ConstraintViolation {
                path: target.to_string(),
                message: format!("cannot place '{source}' inside itself"),
            });
        }
        if self.working.entry(target).is_some() {
            return Err(RetrofitError::ItemExists {
                path: target.to_string(),
            });
        }
        Ok(())
    }

    /// Document-order paths of every node in the working tree.
    fn all_paths(&self) -> Vec<String> {
        self.working.subtree_paths("/")
    }
}

impl ContentStore for MemoryStore {
    fn get(&self, node_path: &str) -> Result<Option<Node>> {
        self.ensure_connected()?;
        path::validate_absolute(node_path)?;
        Ok(self.working.node(node_path))
    }

    fn children(&self, node_path: &str) -> Result<Vec<Node>> {
        self.ensure_connected()?;
        path::validate_absolute(node_path)?;
        let entry = self
            .working
            .entry(node_path)
            .ok_or_else(|| RetrofitError::PathNotFound {
                path: node_path.to_string(),
            })?;
        Ok(entry
            .children
            .iter()
            .filter_map(|name| self.working.node(&path::join(node_path, name)))
            .collect())
    }

    fn query(&self, statement: &str, language: QueryLanguage) -> Result<Vec<Node>> {
        self.ensure_connected()?;
        match language {
            QueryLanguage::Sql2 => {
                let query = sql2::parse(statement)?;
                let nodes = self
                    .all_paths()
                    .into_iter()
                    .filter_map(|p| self.working.node(&p))
                    .filter(|n| query.matches(n))
                    .collect::<Vec<_>>();
                tracing::debug!(statement, matches = nodes.len(), "Query executed");
                Ok(nodes)
            }
            other => Err(RetrofitError::UnsupportedQueryLanguage(other.to_string())),
        }
    }

    fn set_property(&mut self, node_path: &str, name: &str, value: Value) -> Result<()> {
        self.ensure_writable(node_path)?;
        self.working
            .entry_mut(node_path)?
            .properties
            .insert(name.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    fn remove_property(&mut self, node_path: &str, name: &str) -> Result<Option<Value>> {
        self.ensure_writable(node_path)?;
        let previous = self.working.entry_mut(node_path)?.properties.remove(name);
        if previous.is_some() {
            self.dirty = true;
        }
        Ok(previous)
    }

    fn create_node(&mut self, node_path: &str, properties: Properties) -> Result<()> {
        self.ensure_writable(node_path)?;
        self.working.insert(node_path, properties)?;
        self.dirty = true;
        Ok(())
    }

    fn copy_node(&mut self, node_path: &str, dest_parent: &str) -> Result<String> {
        self.ensure_connected()?;
        self.ensure_exists(node_path)?;
        self.ensure_exists(dest_parent)?;
        let target = path::join(dest_parent, path::name(node_path));
        self.ensure_writable(&target)?;
        self.check_relocation(node_path, &target)?;

        let subtree = self.working.cloned_subtree(node_path);
        self.working
            .entry_mut(dest_parent)?
            .children
            .push(path::name(node_path).to_string());
        self.working.attach(node_path, &target, subtree);
        self.dirty = true;
        Ok(target)
    }

    fn move_node(&mut self, node_path: &str, dest_parent: &str) -> Result<String> {
        self.ensure_writable(node_path)?;
        self.ensure_exists(node_path)?;
        self.ensure_exists(dest_parent)?;
        let target = path::join(dest_parent, path::name(node_path));
        self.ensure_writable(&target)?;
        self.check_relocation(node_path, &target)?;

        let subtree = self.working.detach(node_path);
        self.working
            .entry_mut(dest_parent)?
            .children
            .push(path::name(node_path).to_string());
        self.working.attach(node_path, &target, subtree);
        self.dirty = true;
        Ok(target)
    }

    fn rename_node(&mut self, node_path: &str, new_name: &str) -> Result<String> {
        self.ensure_writable(node_path)?;
        path::validate_name(new_name)?;
        self.ensure_exists(node_path)?;
        let parent = path::parent(node_path)
            .ok_or_else(|| RetrofitError::ConstraintViolation {
                path: node_path.to_string(),
                message: "the root node cannot be renamed".into(),
            })?
            .to_string();
        let target = path::join(&parent, new_name);
        if target == node_path {
            return Ok(target);
        }
        self.check_relocation(node_path, &target)?;

        let old_name = path::name(node_path).to_string();
        let position = self
            .working
            .entry(&parent)
            .and_then(|e| e.children.iter().position(|c| *c == old_name));
        let subtree = self.working.detach(node_path);
        let siblings = &mut self.working.entry_mut(&parent)?.children;
        match position {
            Some(idx) => siblings.insert(idx, new_name.to_string()),
            None => siblings.push(new_name.to_string()),
        }
        self.working.attach(node_path, &target, subtree);
        self.dirty = true;
        Ok(target)
    }

    fn delete_node(&mut self, node_path: &str) -> Result<()> {
        self.ensure_writable(node_path)?;
        if node_path == "/" {
            return Err(RetrofitError::ConstraintViolation {
                path: node_path.to_string(),
                message: "the root node cannot be deleted".into(),
            });
        }
        self.ensure_exists(node_path)?;
        self.working.detach(node_path);
        self.dirty = true;
        Ok(())
    }

    fn has_pending_changes(&self) -> bool {
        self.dirty
    }

    fn commit(&mut self) -> Result<()> {
        self.commit_calls += 1;
        self.ensure_connected()?;
        if let Some(message) = self.fail_next_commit.take() {
            tracing::warn!(%message, "Commit rejected");
            return Err(RetrofitError::Commit(message));
        }
        self.committed = self.working.clone();
        self.dirty = false;
        self.commits += 1;
        tracing::debug!(commits = self.commits, "Store committed");
        Ok(())
    }

    fn revert(&mut self) {
        self.working = self.committed.clone();
        self.dirty = false;
    }
}
