//! Run report: the append-only trace of one run.
//!
//! Text form: one banner line, then for each processed node its path followed
//! by one indented `LABEL action: message` line per action. Skipped traversal entries and a fatal
//! abort get their own lines.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use retrofit_types::{ActionResult, RetrofitError};

use crate::context::RunMode;
use crate::traversal::Traversal;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportLine {
    Banner { mode: RunMode },
    Node { path: String },
    Action { action: String, result: ActionResult },
    Skipped { traversal: String, reason: String },
    Aborted { error: String },
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLine::Banner { mode: RunMode::Dry } => {
                write!(f, "Running content upgrade DRY...")
            }
            ReportLine::Banner { mode: RunMode::Live } => {
                write!(f, "Running content upgrade ...")
            }
            ReportLine::Node { path } => write!(f, "{path}"),
            ReportLine::Action { action, result } => {
                write!(f, "  {} {action}: {}", result.label(), result.message())
            }
            ReportLine::Skipped { traversal, reason } => {
                write!(f, "SKIPPED {traversal}: {reason}")
            }
            ReportLine::Aborted { error } => write!(f, "ABORTED: {error}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    lines: Vec<ReportLine>,
    /// Nodes that passed the filter and had their action chain run.
    pub nodes_visited: usize,
    /// Nodes rejected by the filter.
    pub nodes_filtered: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub skipped: usize,
    pub committed: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            lines: vec![ReportLine::Banner { mode }],
            nodes_visited: 0,
            nodes_filtered: 0,
            applied: 0,
            unchanged: 0,
            failed: 0,
            skipped: 0,
            committed: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    /// Report rendered line by line.
    pub fn text_lines(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.to_string()).collect()
    }

    /// Paths of processed nodes, in processing order.
    pub fn visited_paths(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                ReportLine::Node { path } => Some(path.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Results of every action run, in order.
    pub fn action_results(&self) -> Vec<&ActionResult> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                ReportLine::Action { result, .. } => Some(result),
                _ => None,
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.skipped > 0
    }

    pub(crate) fn record_node(&mut self, path: &str) {
        self.nodes_visited += 1;
        self.lines.push(ReportLine::Node {
            path: path.to_string(),
        });
    }

    pub(crate) fn record_filtered(&mut self) {
        self.nodes_filtered += 1;
    }

    pub(crate) fn record_action(&mut self, action: String, result: ActionResult) {
        match &result {
            ActionResult::Applied(_) => self.applied += 1,
            ActionResult::NoChange(_) => self.unchanged += 1,
            ActionResult::Failed(_) => self.failed += 1,
        }
        self.lines.push(ReportLine::Action { action, result });
    }

    pub(crate) fn record_skipped(&mut self, traversal: &Traversal, reason: &RetrofitError) {
        self.skipped += 1;
        self.lines.push(ReportLine::Skipped {
            traversal: traversal.to_string(),
            reason: reason.to_string(),
        });
    }

    pub(crate) fn record_aborted(&mut self, error: &RetrofitError) {
        self.lines.push(ReportLine::Aborted {
            error: error.to_string(),
        });
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn finish(&mut self, committed: bool) {
        self.committed = committed;
        self.finished_at = Some(Utc::now());
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
