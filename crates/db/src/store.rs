//! The job store contract consumed by the pipeline.

use async_trait::async_trait;
use researcher_core::analysis::{Analysis, NewAnalysis};
use researcher_core::error::CoreError;
use researcher_core::types::DbId;

/// Maximum page size for analysis listing.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for analysis listing.
pub const DEFAULT_LIMIT: i64 = 50;

/// Errors from a [`JobStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `put` or `delete` targeted an id that does not exist.
    #[error("Analysis {0} not found")]
    NotFound(DbId),

    /// The database rejected or failed the query.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back to an [`Analysis`].
    #[error("Corrupt analysis row: {0}")]
    Corrupt(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CoreError::NotFound {
                entity: "Analysis",
                id,
            },
            other => CoreError::Internal(other.to_string()),
        }
    }
}

/// Keyed persistence for analysis records.
///
/// Implementations must give read-your-writes consistency within one
/// process: a `get` issued after a completed `put` observes that write.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a record by id.
    async fn get(&self, id: DbId) -> Result<Option<Analysis>, StoreError>;

    /// Overwrite an existing record with `analysis`.
    async fn put(&self, analysis: &Analysis) -> Result<(), StoreError>;

    /// Persist a new pending record and return it with its assigned id.
    async fn create(&self, input: NewAnalysis) -> Result<Analysis, StoreError>;

    /// List records newest first, optionally restricted to one owner.
    async fn list(
        &self,
        owner_id: Option<DbId>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Analysis>, StoreError>;

    /// Delete a record. Returns `false` if it did not exist.
    async fn delete(&self, id: DbId) -> Result<bool, StoreError>;
}

/// Clamp a requested page size into `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Clamp a requested offset to be non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}
