//! In-process [`JobStore`] used when no database is configured.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use researcher_core::analysis::{Analysis, NewAnalysis};
use researcher_core::types::DbId;
use tokio::sync::RwLock;

use crate::store::{clamp_limit, clamp_offset, JobStore, StoreError};

/// Records kept in a `BTreeMap` keyed by id.
///
/// Ids start at 1 and increase monotonically, matching `BIGSERIAL`.
pub struct InMemoryJobStore {
    records: RwLock<BTreeMap<DbId, Analysis>>,
    next_id: AtomicI64,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, id: DbId) -> Result<Option<Analysis>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn put(&self, analysis: &Analysis) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&analysis.id) {
            Some(slot) => {
                *slot = analysis.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(analysis.id)),
        }
    }

    async fn create(&self, input: NewAnalysis) -> Result<Analysis, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let analysis = Analysis::from_new(id, input, chrono::Utc::now());
        self.records.write().await.insert(id, analysis.clone());
        Ok(analysis)
    }

    async fn list(
        &self,
        owner_id: Option<DbId>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Analysis>, StoreError> {
        let limit = clamp_limit(limit) as usize;
        let offset = clamp_offset(offset) as usize;
        let records = self.records.read().await;
        // Ids are assigned in creation order, so reverse id order is newest first.
        Ok(records
            .values()
            .rev()
            .filter(|a| owner_id.is_none() || a.owner_id == owner_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}
