//! Immutable execution plan produced by [`crate::MigrationBuilder::build`].

use retrofit_store::ContentStore;

use crate::actions::Action;
use crate::context::RunMode;
use crate::executor::{self, RunFailure};
use crate::filter::Filter;
use crate::report::RunReport;
use crate::services::Services;
use crate::traversal::Traversal;

/// Traversals, the optional filter and the ordered action chain of one
/// migration. A plan can be run any number of times, dry or live.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub(crate) traversals: Vec<Traversal>,
    pub(crate) filter: Option<Filter>,
    pub(crate) actions: Vec<Action>,
}

impl MigrationPlan {
    pub fn traversals(&self) -> &[Traversal] {
        &self.traversals
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Execute the plan. In [`RunMode::Live`] the store is committed exactly
    /// once after every traversal has been processed.
    pub fn run(
        &self,
        store: &mut dyn ContentStore,
        services: &Services,
        mode: RunMode,
    ) -> Result<RunReport, RunFailure> {
        executor::execute(self, store, services, mode)
    }

    pub fn dry_run(
        &self,
        store: &mut dyn ContentStore,
        services: &Services,
    ) -> Result<RunReport, RunFailure> {
        self.run(store, services, RunMode::Dry)
    }

    pub fn run_live(
        &self,
        store: &mut dyn ContentStore,
        services: &Services,
    ) -> Result<RunReport, RunFailure> {
        self.run(store, services, RunMode::Live)
    }
}
