//! Tracks which analysis ids have a run in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use researcher_core::error::CoreError;
use researcher_core::types::{DbId, Timestamp};

/// In-flight run bookkeeping, one entry per analysis id.
///
/// Claiming an id returns a [`RunGuard`]; the id is released when the
/// guard is dropped, including when the run task panics.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<DbId, Timestamp>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `id` for a new run.
    ///
    /// Fails with [`CoreError::Conflict`] if a run for `id` is in flight.
    pub fn try_claim(self: &Arc<Self>, id: DbId) -> Result<RunGuard, CoreError> {
        let mut runs = self.lock();
        if let Some(started_at) = runs.get(&id) {
            return Err(CoreError::Conflict(format!(
                "Analysis {id} already has a run in progress (started {started_at})"
            )));
        }
        runs.insert(id, chrono::Utc::now());
        Ok(RunGuard {
            registry: Arc::clone(self),
            id,
        })
    }

    pub fn is_running(&self, id: DbId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Ids with a run in flight, ascending.
    pub fn in_flight(&self) -> Vec<DbId> {
        let mut ids: Vec<DbId> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn release(&self, id: DbId) {
        self.lock().remove(&id);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DbId, Timestamp>> {
        // Critical sections never panic, so a poisoned lock still holds a
        // consistent map.
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exclusive claim on one analysis id.
#[derive(Debug)]
pub struct RunGuard {
    registry: Arc<RunRegistry>,
    id: DbId,
}

impl RunGuard {
    pub fn id(&self) -> DbId {
        self.id
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn second_claim_conflicts_until_release() {
        let registry = Arc::new(RunRegistry::new());
        let guard = registry.try_claim(42).unwrap();
        assert_eq!(guard.id(), 42);
        assert!(registry.is_running(42));

        assert_matches!(registry.try_claim(42), Err(CoreError::Conflict(_)));

        drop(guard);
        assert!(!registry.is_running(42));
        assert!(registry.try_claim(42).is_ok());
    }

    #[test]
    fn ids_are_independent() {
        let registry = Arc::new(RunRegistry::new());
        let _a = registry.try_claim(2).unwrap();
        let _b = registry.try_claim(1).unwrap();
        assert_eq!(registry.in_flight(), vec![1, 2]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn guard_released_on_panic() {
        let registry = Arc::new(RunRegistry::new());
        let cloned = Arc::clone(&registry);
        let result = std::thread::spawn(move || {
            let _guard = cloned.try_claim(7).unwrap();
            panic!("run crashed");
        })
        .join();
        assert!(result.is_err());
        assert!(registry.is_empty());
    }
}
