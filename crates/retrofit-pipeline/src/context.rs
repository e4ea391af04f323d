//! Per-run execution context handed to every action.

use std::fmt;

use serde::{Deserialize, Serialize};

use retrofit_store::ContentStore;
use retrofit_types::Result;

use crate::services::Services;

/// Whether a run persists its changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Report intended changes without writing or committing anything.
    Dry,
    /// Apply changes and commit once at the end.
    Live,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Dry => write!(f, "dry"),
            RunMode::Live => write!(f, "live"),
        }
    }
}

/// Store handle, run mode and services for exactly one run.
///
/// Actions read through [`RunContext::store`] and write only through
/// [`RunContext::mutate`], which skips the write in dry-run mode.
pub struct RunContext<'a> {
    store: &'a mut dyn ContentStore,
    services: &'a Services,
    mode: RunMode,
}

impl<'a> RunContext<'a> {
    pub fn new(store: &'a mut dyn ContentStore, services: &'a Services, mode: RunMode) -> Self {
        Self {
            store,
            services,
            mode,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == RunMode::Dry
    }

    pub fn store(&self) -> &dyn ContentStore {
        &*self.store
    }

    pub fn services(&self) -> &Services {
        self.services
    }

    /// Perform a store write in live mode. In dry-run mode the closure is not
    /// called and `Ok(None)` is returned.
    pub fn mutate<T>(
        &mut self,
        write: impl FnOnce(&mut dyn ContentStore) -> Result<T>,
    ) -> Result<Option<T>> {
        match self.mode {
            RunMode::Dry => Ok(None),
            RunMode::Live => write(&mut *self.store).map(Some),
        }
    }

    pub(crate) fn commit(&mut self) -> Result<()> {
        self.store.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrofit_store::MemoryStore;
    use retrofit_types::Value;

    fn store() -> MemoryStore {
        MemoryStore::from_json(&serde_json::json!({ "content": { "a": {} } })).unwrap()
    }

    #[test]
    fn dry_run_skips_writes() {
        let mut store = store();
        let services = Services::new();
        let mut ctx = RunContext::new(&mut store, &services, RunMode::Dry);
        assert!(ctx.is_dry_run());

        let out = ctx
            .mutate(|s| s.set_property("/content/a", "x", Value::from("y")))
            .unwrap();
        assert!(out.is_none());
        assert!(!store.has_pending_changes());
    }

    #[test]
    fn live_run_writes() {
        let mut store = store();
        let services = Services::new();
        let mut ctx = RunContext::new(&mut store, &services, RunMode::Live);

        let out = ctx
            .mutate(|s| s.set_property("/content/a", "x", Value::from("y")))
            .unwrap();
        assert_eq!(out, Some(()));
        let node = ctx.store().get("/content/a").unwrap().unwrap();
        assert_eq!(node.property("x"), Some(&Value::from("y")));
    }

    #[test]
    fn run_mode_display_and_serde() {
        assert_eq!(RunMode::Dry.to_string(), "dry");
        assert_eq!(serde_json::to_string(&RunMode::Live).unwrap(), "\"live\"");
    }
}
