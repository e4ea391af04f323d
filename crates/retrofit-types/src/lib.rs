//! Shared types, errors, node values, and action outcomes for the Retrofit migration engine.
//!
//! This crate provides the foundational types used across all other Retrofit crates:
//! - `RetrofitError`: unified error taxonomy with fatal/local classification
//! - `Value` and `Properties`: property values of a content node
//! - `Node`: snapshot of one entry of the hierarchical store
//! - `ActionResult`: outcome of applying one action to one node

pub mod path;
mod value;

pub use value::{Node, Properties, Value, PRIMARY_TYPE};

/// Unified error type for all Retrofit subsystems.
#[derive(Debug, thiserror::Error)]
pub enum RetrofitError {
    // === Resolution Errors ===
    #[error("Path '{path}' does not exist")]
    PathNotFound { path: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid {language} query: {message}")]
    InvalidQuery { language: String, message: String },

    #[error("Query language '{0}' is not supported by this store")]
    UnsupportedQueryLanguage(String),

    // === Node Errors ===
    #[error("An item already exists at '{path}'")]
    ItemExists { path: String },

    #[error("Constraint violation at '{path}': {message}")]
    ConstraintViolation { path: String, message: String },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    // === Service Errors ===
    #[error("Service '{service}' failed: {message}")]
    Service { service: String, message: String },

    // === Store Errors ===
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Commit failed: {0}")]
    Commit(String),

    // === Plan Errors ===
    #[error("Invalid migration plan: {0}")]
    InvalidPlan(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl RetrofitError {
    /// Returns `true` if the error means the store itself is unusable and the
    /// whole run must stop without committing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RetrofitError::StoreUnavailable(_) | RetrofitError::Commit(_)
        )
    }

    /// Returns `true` if the error stems from resolving a path or a query,
    /// i.e. it only affects a single traversal entry.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            RetrofitError::PathNotFound { .. }
                | RetrofitError::InvalidPath { .. }
                | RetrofitError::InvalidQuery { .. }
                | RetrofitError::UnsupportedQueryLanguage(_)
        )
    }
}

/// A convenience alias for `Result<T, RetrofitError>`.
pub type Result<T> = std::result::Result<T, RetrofitError>;

// ---------------------------------------------------------------------------
// ActionResult
// ---------------------------------------------------------------------------

/// Outcome of a single action on a single node. Every variant carries the
/// human-readable trace text that ends up in the run report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ActionResult {
    NoChange(String),
    Applied(String),
    Failed(String),
}

impl ActionResult {
    pub fn no_change(message: impl Into<String>) -> Self {
        ActionResult::NoChange(message.into())
    }

    pub fn applied(message: impl Into<String>) -> Self {
        ActionResult::Applied(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ActionResult::Failed(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            ActionResult::NoChange(m) | ActionResult::Applied(m) | ActionResult::Failed(m) => m,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ActionResult::Applied(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ActionResult::Failed(_))
    }

    /// Short upper-case label used in report lines.
    pub fn label(&self) -> &'static str {
        match self {
            ActionResult::NoChange(_) => "NO CHANGE",
            ActionResult::Applied(_) => "APPLIED",
            ActionResult::Failed(_) => "FAILED",
        }
    }
}
