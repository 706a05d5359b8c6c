//! Query parameter types for API handlers.

use researcher_core::types::DbId;
use serde::Deserialize;

/// `GET /analyses?owner_id=&limit=&offset=`.
///
/// Paging values are clamped in the store layer via `clamp_limit` /
/// `clamp_offset`.
#[derive(Debug, Default, Deserialize)]
pub struct AnalysisListParams {
    pub owner_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
