//! Page-lifecycle services consumed by page actions.
//!
//! The pipeline never talks to a replication agent or a web tier directly; it
//! goes through [`Replicator`] and [`PageRenderer`], bundled in [`Services`].
//! A missing service makes the action that needs it fail for that node only.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use retrofit_types::Result;

// ---------------------------------------------------------------------------
// Replication
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationAction {
    Activate,
    Deactivate,
}

impl fmt::Display for ReplicationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationAction::Activate => write!(f, "Activate"),
            ReplicationAction::Deactivate => write!(f, "Deactivate"),
        }
    }
}

/// Publishes or unpublishes a page.
pub trait Replicator: Send + Sync {
    fn replicate(&self, page_path: &str, action: ReplicationAction) -> Result<()>;
}

/// Replicator that records every call instead of publishing anything.
#[derive(Default)]
pub struct RecordingReplicator {
    calls: Mutex<Vec<(String, ReplicationAction)>>,
}

impl RecordingReplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, ReplicationAction)> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Replicator for RecordingReplicator {
    fn replicate(&self, page_path: &str, action: ReplicationAction) -> Result<()> {
        tracing::debug!(page = page_path, %action, "Replication recorded");
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((page_path.to_string(), action));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResponse {
    pub status: u16,
    pub body: String,
}

/// Renders a page and returns the HTTP-like response.
pub trait PageRenderer: Send + Sync {
    fn render(&self, page_path: &str) -> Result<RenderResponse>;
}

/// Renderer with canned responses; unknown pages answer 404.
#[derive(Debug, Clone, Default)]
pub struct StaticRenderer {
    pages: HashMap<String, RenderResponse>,
}

impl StaticRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(
        mut self,
        page_path: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        self.pages.insert(
            page_path.into(),
            RenderResponse {
                status,
                body: body.into(),
            },
        );
        self
    }
}

impl PageRenderer for StaticRenderer {
    fn render(&self, page_path: &str) -> Result<RenderResponse> {
        Ok(self
            .pages
            .get(page_path)
            .cloned()
            .unwrap_or_else(|| RenderResponse {
                status: 404,
                body: String::new(),
            }))
    }
}

// ---------------------------------------------------------------------------
// Services bundle
// ---------------------------------------------------------------------------

/// Optional collaborators available to actions during a run.
#[derive(Clone, Default)]
pub struct Services {
    pub replicator: Option<Arc<dyn Replicator>>,
    pub renderer: Option<Arc<dyn PageRenderer>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replicator(mut self, replicator: Arc<dyn Replicator>) -> Self {
        self.replicator = Some(replicator);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("replicator", &self.replicator.is_some())
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}
