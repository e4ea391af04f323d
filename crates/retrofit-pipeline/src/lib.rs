//! Content migration pipeline: traversals, filters, actions, and the
//! dry-run/commit executor.
//!
//! A [`MigrationBuilder`] collects traversal strategies, at most one
//! (possibly composite) [`Filter`], and an ordered list of [`Action`]s. It is
//! finalized into an immutable [`MigrationPlan`], which walks every traversal
//! against a [`retrofit_store::ContentStore`], runs the action chain on each
//! node the filter accepts, and returns a [`RunReport`]. Live runs commit the
//! store exactly once, after all work.

pub mod actions;
pub mod builder;
pub mod context;
pub mod executor;
pub mod filter;
pub mod pattern;
pub mod plan;
pub mod plan_file;
pub mod report;
pub mod services;
pub mod traversal;
pub mod validation;

pub use actions::{Action, CustomAction, FnAction, PropertyScope};
pub use builder::MigrationBuilder;
pub use context::{RunContext, RunMode};
pub use executor::RunFailure;
pub use filter::{Filter, FnPredicate, NodePredicate};
pub use pattern::Pattern;
pub use plan::MigrationPlan;
pub use plan_file::{load_plan, PlanFile};
pub use report::{ReportLine, RunReport};
pub use services::{
    PageRenderer, RecordingReplicator, RenderResponse, ReplicationAction, Replicator, Services,
    StaticRenderer,
};
pub use traversal::Traversal;
pub use validation::{validate, validate_or_raise, Diagnostic, LintRule, Severity};
