//! Handlers for the `/analyses` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use researcher_core::analysis::{Analysis, NewAnalysis, UpdateAnalysis};
use researcher_core::report::Report;
use researcher_core::types::DbId;
use serde::Serialize;

use crate::error::AppResult;
use crate::query::AnalysisListParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /analyses/{id}/run`.
#[derive(Debug, Serialize)]
pub struct RunAccepted {
    pub id: DbId,
    pub running: bool,
}

/// GET /api/v1/analyses
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<AnalysisListParams>,
) -> AppResult<Json<DataResponse<Vec<Analysis>>>> {
    let analyses = state
        .store
        .list(params.owner_id, params.limit, params.offset)
        .await?;
    Ok(Json(DataResponse { data: analyses }))
}

/// POST /api/v1/analyses
///
/// Returns the `pending` record; the run is already underway.
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<NewAnalysis>,
) -> AppResult<(StatusCode, Json<DataResponse<Analysis>>)> {
    let (analysis, _run) = state.orchestrator.submit(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: analysis })))
}

/// GET /api/v1/analyses/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Analysis>>> {
    let analysis = state.orchestrator.get(id).await?;
    Ok(Json(DataResponse { data: analysis }))
}

/// PUT /api/v1/analyses/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateAnalysis>,
) -> AppResult<Json<DataResponse<Analysis>>> {
    let analysis = state.orchestrator.update_details(id, input).await?;
    Ok(Json(DataResponse { data: analysis }))
}

/// DELETE /api/v1/analyses/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    state.orchestrator.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/analyses/{id}/run
pub async fn start_run(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<(StatusCode, Json<DataResponse<RunAccepted>>)> {
    let run = state.orchestrator.start_run(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: RunAccepted {
                id: run.job_id(),
                running: true,
            },
        }),
    ))
}

/// GET /api/v1/analyses/{id}/report
///
/// 409 unless the analysis has completed.
pub async fn report(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Report>>> {
    let analysis = state.orchestrator.get(id).await?;
    let report = Report::build(&analysis, chrono::Utc::now())?;
    Ok(Json(DataResponse { data: report }))
}
