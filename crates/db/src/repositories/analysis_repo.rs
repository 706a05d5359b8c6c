//! Repository for the `analyses` table.

use async_trait::async_trait;
use researcher_core::analysis::{Analysis, AnalysisStatus, NewAnalysis};
use researcher_core::types::{DbId, Timestamp};
use sqlx::{FromRow, PgPool};

use crate::store::{clamp_limit, clamp_offset, JobStore, StoreError};

/// Column list for `analyses` queries.
const COLUMNS: &str = "\
    id, title, description, research_topic, parameters, \
    status, progress, owner_id, created_at, updated_at";

/// A row from the `analyses` table.
#[derive(Debug, FromRow)]
struct AnalysisRow {
    id: DbId,
    title: String,
    description: Option<String>,
    research_topic: String,
    parameters: serde_json::Value,
    status: String,
    progress: f64,
    owner_id: Option<DbId>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<AnalysisRow> for Analysis {
    type Error = StoreError;

    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        let status: AnalysisStatus = row
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("analysis {}: {e}", row.id)))?;
        let parameters = match row.parameters {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(StoreError::Corrupt(format!(
                    "analysis {}: parameters is not an object: {other}",
                    row.id
                )))
            }
        };
        Ok(Analysis {
            id: row.id,
            title: row.title,
            description: row.description,
            topic: row.research_topic,
            parameters,
            status,
            progress: row.progress,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Provides CRUD operations for analyses.
pub struct AnalysisRepo;

impl AnalysisRepo {
    /// Insert a new pending analysis.
    pub async fn create(pool: &PgPool, input: &NewAnalysis) -> Result<Analysis, StoreError> {
        let query = format!(
            "INSERT INTO analyses (title, description, research_topic, parameters, status, progress, owner_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        let title = input.title.clone().unwrap_or_else(|| input.topic.clone());
        let row = sqlx::query_as::<_, AnalysisRow>(&query)
            .bind(title)
            .bind(&input.description)
            .bind(&input.topic)
            .bind(serde_json::Value::Object(input.parameters.clone()))
            .bind(AnalysisStatus::Pending.as_str())
            .bind(researcher_core::analysis::PROGRESS_PENDING)
            .bind(input.owner_id)
            .fetch_one(pool)
            .await?;
        row.try_into()
    }

    /// Find an analysis by id.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Analysis>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM analyses WHERE id = $1");
        sqlx::query_as::<_, AnalysisRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(Analysis::try_from)
            .transpose()
    }

    /// Write every mutable column of `analysis`.
    ///
    /// Returns `false` if no row has that id.
    pub async fn update(pool: &PgPool, analysis: &Analysis) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE analyses \
             SET title = $2, description = $3, parameters = $4, status = $5, \
                 progress = $6, updated_at = $7 \
             WHERE id = $1",
        )
        .bind(analysis.id)
        .bind(&analysis.title)
        .bind(&analysis.description)
        .bind(serde_json::Value::Object(analysis.parameters.clone()))
        .bind(analysis.status.as_str())
        .bind(analysis.progress)
        .bind(analysis.updated_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List analyses newest first.
    pub async fn list(
        pool: &PgPool,
        owner_id: Option<DbId>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Analysis>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM analyses \
             WHERE ($1::BIGINT IS NULL OR owner_id = $1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, AnalysisRow>(&query)
            .bind(owner_id)
            .bind(clamp_limit(limit))
            .bind(clamp_offset(offset))
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(Analysis::try_from)
            .collect()
    }

    /// Delete an analysis. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM analyses WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// [`JobStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn get(&self, id: DbId) -> Result<Option<Analysis>, StoreError> {
        AnalysisRepo::find_by_id(&self.pool, id).await
    }

    async fn put(&self, analysis: &Analysis) -> Result<(), StoreError> {
        if AnalysisRepo::update(&self.pool, analysis).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(analysis.id))
        }
    }

    async fn create(&self, input: NewAnalysis) -> Result<Analysis, StoreError> {
        AnalysisRepo::create(&self.pool, &input).await
    }

    async fn list(
        &self,
        owner_id: Option<DbId>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Analysis>, StoreError> {
        AnalysisRepo::list(&self.pool, owner_id, limit, offset).await
    }

    async fn delete(&self, id: DbId) -> Result<bool, StoreError> {
        AnalysisRepo::delete(&self.pool, id).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn row(status: &str, parameters: serde_json::Value) -> AnalysisRow {
        let now = chrono::Utc::now();
        AnalysisRow {
            id: 3,
            title: "Title".into(),
            description: None,
            research_topic: "Topic".into(),
            parameters,
            status: status.into(),
            progress: 0.5,
            owner_id: Some(11),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_maps_to_analysis() {
        let a = Analysis::try_from(row("analyzing", json!({"research_data": "notes"}))).unwrap();
        assert_eq!(a.status, AnalysisStatus::Analyzing);
        assert_eq!(a.topic, "Topic");
        assert_eq!(a.parameters["research_data"], "notes");
        assert_eq!(a.owner_id, Some(11));
    }

    #[test]
    fn null_parameters_become_empty_map() {
        let a = Analysis::try_from(row("pending", serde_json::Value::Null)).unwrap();
        assert!(a.parameters.is_empty());
    }

    #[test]
    fn unknown_status_is_corrupt() {
        assert_matches!(
            Analysis::try_from(row("processing", json!({}))),
            Err(StoreError::Corrupt(_))
        );
    }

    #[test]
    fn non_object_parameters_are_corrupt() {
        assert_matches!(
            Analysis::try_from(row("pending", json!([1, 2]))),
            Err(StoreError::Corrupt(_))
        );
    }
}
