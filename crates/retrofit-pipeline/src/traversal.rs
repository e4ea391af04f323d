//! Traversal strategies: declarative node sources resolved at run time.

use std::fmt;

use retrofit_store::{ContentStore, QueryLanguage};
use retrofit_types::{Node, Result, RetrofitError};

#[derive(Debug, Clone, PartialEq)]
pub enum Traversal {
    /// Explicit paths, visited in declaration order.
    Resources(Vec<String>),
    /// Immediate children of a node.
    ChildrenOf(String),
    /// Depth-first pre-order walk below `path`, optionally including `path`
    /// itself and optionally bounded (1 = children only).
    Descendants {
        path: String,
        include_root: bool,
        max_depth: Option<usize>,
    },
    Query {
        statement: String,
        language: QueryLanguage,
    },
}

impl Traversal {
    /// Resolve into an ordered list of entries.
    ///
    /// Explicit path lists yield one entry per path, so one missing path does
    /// not hide the others. Every other strategy yields either its nodes or a
    /// single error entry.
    pub fn resolve(&self, store: &dyn ContentStore) -> Vec<Result<Node>> {
        match self {
            Traversal::Resources(paths) => paths
                .iter()
                .map(|p| {
                    store.get(p)?.ok_or_else(|| RetrofitError::PathNotFound {
                        path: p.clone(),
                    })
                })
                .collect(),
            Traversal::ChildrenOf(path) => flatten(store.children(path)),
            Traversal::Descendants {
                path,
                include_root,
                max_depth,
            } => flatten(store.descendants(path, *include_root, *max_depth)),
            Traversal::Query {
                statement,
                language,
            } => flatten(store.query(statement, *language)),
        }
    }
}

fn flatten(resolved: Result<Vec<Node>>) -> Vec<Result<Node>> {
    match resolved {
        Ok(nodes) => nodes.into_iter().map(Ok).collect(),
        Err(e) => vec![Err(e)],
    }
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Traversal::Resources(paths) => write!(f, "for_resources([{}])", paths.join(", ")),
            Traversal::ChildrenOf(path) => write!(f, "for_child_resources_of({path})"),
            Traversal::Descendants {
                path,
                include_root,
                max_depth,
            } => {
                let name = if *include_root {
                    "for_resources_in_subtree"
                } else {
                    "for_descendant_resources_of"
                };
                match max_depth {
                    Some(depth) => write!(f, "{name}({path}, max_depth={depth})"),
                    None => write!(f, "{name}({path})"),
                }
            }
            Traversal::Query {
                statement,
                language,
            } => write!(f, "for_resources_by_query({language}: {statement})"),
        }
    }
}
