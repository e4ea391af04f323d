//! Pipeline executor: walks traversals, gates nodes through the filter, runs
//! the action chain and commits once in live mode.

use retrofit_store::ContentStore;
use retrofit_types::{ActionResult, Node, RetrofitError};

use crate::actions::Action;
use crate::context::{RunContext, RunMode};
use crate::plan::MigrationPlan;
use crate::report::RunReport;
use crate::services::Services;
use crate::traversal::Traversal;

/// A run aborted by a fatal store error or a failed commit. Nothing was
/// committed; `report` holds everything traced up to the abort.
#[derive(Debug, thiserror::Error)]
#[error("content migration aborted: {error}")]
pub struct RunFailure {
    #[source]
    pub error: RetrofitError,
    pub report: RunReport,
}

pub(crate) fn execute(
    plan: &MigrationPlan,
    store: &mut dyn ContentStore,
    services: &Services,
    mode: RunMode,
) -> Result<RunReport, RunFailure> {
    let mut report = RunReport::new(mode);
    tracing::info!(
        %mode,
        traversals = plan.traversals.len(),
        actions = plan.actions.len(),
        "Content migration started"
    );

    let mut ctx = RunContext::new(store, services, mode);
    for traversal in &plan.traversals {
        if let Err(error) = run_traversal(plan, traversal, &mut ctx, &mut report) {
            return Err(abort(error, report));
        }
    }

    let committed = match mode {
        RunMode::Dry => false,
        RunMode::Live => {
            if let Err(error) = ctx.commit() {
                return Err(abort(error, report));
            }
            tracing::info!("Content migration committed");
            true
        }
    };

    report.finish(committed);
    tracing::info!(
        %mode,
        nodes = report.nodes_visited,
        applied = report.applied,
        failed = report.failed,
        skipped = report.skipped,
        "Content migration finished"
    );
    Ok(report)
}

fn abort(error: RetrofitError, mut report: RunReport) -> RunFailure {
    tracing::error!(%error, "Content migration aborted");
    report.record_aborted(&error);
    RunFailure { error, report }
}

/// Process one traversal. Only fatal errors are returned.
fn run_traversal(
    plan: &MigrationPlan,
    traversal: &Traversal,
    ctx: &mut RunContext<'_>,
    report: &mut RunReport,
) -> Result<(), RetrofitError> {
    let entries = traversal.resolve(ctx.store());
    for entry in entries {
        let resolved = match entry {
            Ok(node) => ctx.store().get(&node.path).map(|fresh| fresh.ok_or(node)),
            Err(error) => Err(error),
        };

        let node = match resolved {
            Ok(Ok(node)) => node,
            Ok(Err(stale)) => {
                let error = RetrofitError::PathNotFound { path: stale.path };
                tracing::warn!(%traversal, %error, "Node vanished before processing");
                report.record_skipped(traversal, &error);
                continue;
            }
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                tracing::warn!(%traversal, %error, "Traversal entry skipped");
                report.record_skipped(traversal, &error);
                continue;
            }
        };

        if let Some(filter) = &plan.filter {
            if !filter.accepts(&node) {
                tracing::debug!(path = %node.path, "Node rejected by filter");
                report.record_filtered();
                continue;
            }
        }

        run_actions(&plan.actions, node, ctx, report)?;
    }
    Ok(())
}

/// Run the action chain on one node. Only fatal errors are returned.
fn run_actions(
    actions: &[Action],
    node: Node,
    ctx: &mut RunContext<'_>,
    report: &mut RunReport,
) -> Result<(), RetrofitError> {
    let path = node.path.clone();
    report.record_node(&path);
    let mut current = Some(node);

    for action in actions {
        let result = match &current {
            None => ActionResult::failed(format!("Node {path} no longer exists")),
            Some(node) => match action.apply(node, ctx) {
                Ok(result) => result,
                Err(error) if error.is_fatal() => {
                    report.record_action(
                        action.to_string(),
                        ActionResult::failed(error.to_string()),
                    );
                    return Err(error);
                }
                Err(error) => ActionResult::failed(error.to_string()),
            },
        };

        if result.is_failed() {
            tracing::warn!(%path, %action, reason = result.message(), "Action failed");
        } else {
            tracing::debug!(%path, %action, outcome = result.label(), "Action done");
        }

        // Later actions see the node as the store now has it.
        if result.is_applied() && !ctx.is_dry_run() && current.is_some() {
            current = match ctx.store().get(&path) {
                Ok(fresh) => fresh,
                Err(error) if error.is_fatal() => {
                    report.record_action(action.to_string(), result);
                    return Err(error);
                }
                Err(_) => None,
            };
        }

        report.record_action(action.to_string(), result);
    }
    Ok(())
}
