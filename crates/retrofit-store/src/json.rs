//! JSON import and export of content trees.
//!
//! A tree is a JSON object for the root node. Members whose value is an
//! object are child nodes (in document order); every other member is a
//! property. `null` members are ignored.

use std::path::Path;

use serde_json::{Map, Value as JsonValue};

use retrofit_types::path;
use retrofit_types::{Properties, Result, RetrofitError, Value};

use crate::memory::Tree;
use crate::MemoryStore;

impl MemoryStore {
    /// Build a store whose committed state is the given JSON tree.
    pub fn from_json(tree: &JsonValue) -> Result<Self> {
        Ok(MemoryStore::from_tree(tree_from_json(tree)?))
    }

    /// Load a JSON content tree from a file.
    pub fn load(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        let text = std::fs::read_to_string(file)?;
        let json: JsonValue = serde_json::from_str(&text)?;
        let store = MemoryStore::from_json(&json)?;
        tracing::debug!(file = %file.display(), "Content tree loaded");
        Ok(store)
    }

    /// Export the committed state as JSON. Pending writes are not included.
    pub fn to_json(&self) -> JsonValue {
        tree_to_json(self.committed_tree(), "/")
    }

    /// Write the committed state to a file as pretty-printed JSON.
    pub fn save(&self, file: impl AsRef<Path>) -> Result<()> {
        let file = file.as_ref();
        let text = serde_json::to_string_pretty(&self.to_json())?;
        std::fs::write(file, text)?;
        tracing::debug!(file = %file.display(), "Content tree saved");
        Ok(())
    }
}

fn tree_from_json(root: &JsonValue) -> Result<Tree> {
    let members = root.as_object().ok_or_else(|| {
        RetrofitError::Other("content tree must be a JSON object".into())
    })?;
    let mut tree = Tree::default();
    let (properties, children) = split_members("/", members)?;
    tree.set_root_properties(properties);
    for (name, child) in children {
        insert_subtree(&mut tree, &path::join("/", name), child)?;
    }
    Ok(tree)
}

fn insert_subtree(
    tree: &mut Tree,
    node_path: &str,
    members: &Map<String, JsonValue>,
) -> Result<()> {
    let (properties, children) = split_members(node_path, members)?;
    tree.insert(node_path, properties)?;
    for (name, child) in children {
        insert_subtree(tree, &path::join(node_path, name), child)?;
    }
    Ok(())
}

type Members<'a> = (Properties, Vec<(&'a str, &'a Map<String, JsonValue>)>);

fn split_members<'a>(node_path: &str, members: &'a Map<String, JsonValue>) -> Result<Members<'a>> {
    let mut properties = Properties::new();
    let mut children = Vec::new();
    for (name, value) in members {
        match value {
            JsonValue::Object(child) => {
                path::validate_name(name)?;
                children.push((name.as_str(), child));
            }
            JsonValue::Null => {}
            other => {
                let value: Value = serde_json::from_value(other.clone()).map_err(|e| {
                    RetrofitError::Other(format!(
                        "property '{name}' of '{node_path}' is not a valid value: {e}"
                    ))
                })?;
                properties.insert(name.clone(), value);
            }
        }
    }
    Ok((properties, children))
}

fn tree_to_json(tree: &Tree, node_path: &str) -> JsonValue {
    let mut out = Map::new();
    if let Some(entry) = tree.entry(node_path) {
        for (name, value) in &entry.properties {
            // Value serializes untagged, so this cannot fail.
            if let Ok(json) = serde_json::to_value(value) {
                out.insert(name.clone(), json);
            }
        }
        for child in &entry.children {
            out.insert(child.clone(), tree_to_json(tree, &path::join(node_path, child)));
        }
    }
    JsonValue::Object(out)
}
