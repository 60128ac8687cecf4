use axum::{
    extract::{Path, Query, State},
    Json,
};

use matching_engine::{MatchRunParams, RunSummary};
use store::{DateRange, MatchFilter, MatchStore, Scope};
use types::errors::ReconError;
use types::ids::{MatchId, PayoutRef};
use types::matching::MatchRecord;

use crate::error::AppError;
use crate::models::{
    ListMatchesQuery, ManualMatchRequest, MatchPageResponse, MatchRunRequest, MutationResponse,
};
use crate::state::AppState;

const MAX_PER_PAGE: usize = 200;

pub async fn trigger_run(
    State(state): State<AppState>,
    Json(payload): Json<MatchRunRequest>,
) -> Result<Json<RunSummary>, AppError> {
    let range = DateRange::new(payload.start, payload.end)
        .ok_or_else(|| AppError::BadRequest("start must not be after end".into()))?;
    let params = MatchRunParams {
        range,
        kind: payload.kind,
        scope: Scope {
            cabinet_ids: payload.cabinet_ids.map(|ids| ids.into_iter().collect()),
            user_ids: payload.user_ids.map(|ids| ids.into_iter().collect()),
        },
    };

    // A failed run is a 200 with the error flag set, not an HTTP error:
    // the caller still gets the summary shape it asked for
    Ok(Json(state.engine.run(&params).await))
}

pub async fn list_matches(
    State(state): State<AppState>,
    Query(query): Query<ListMatchesQuery>,
) -> Result<Json<MatchPageResponse>, AppError> {
    if query.page == 0 {
        return Err(AppError::BadRequest("page numbers start at 1".into()));
    }
    if query.per_page == 0 || query.per_page > MAX_PER_PAGE {
        return Err(AppError::BadRequest(format!(
            "per_page must be between 1 and {MAX_PER_PAGE}"
        )));
    }

    let filter = MatchFilter {
        kind: query.kind,
        cabinet_ids: query.cabinet_id.map(|id| [id].into_iter().collect()),
        manual: query.manual,
    };
    let page = state
        .store
        .list_matches(&filter, query.page, query.per_page)
        .map_err(ReconError::from)?;
    Ok(Json(MatchPageResponse::from(page)))
}

pub async fn create_manual_match(
    State(state): State<AppState>,
    Json(payload): Json<ManualMatchRequest>,
) -> Result<Json<MatchRecord>, AppError> {
    let payout = PayoutRef {
        external_id: payload.external_id,
        cabinet_id: payload.cabinet_id,
    };
    let record = state
        .engine
        .create_manual_match(&payout, payload.kind, payload.transaction_id)
        .await?;
    Ok(Json(record))
}

pub async fn delete_match(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
) -> Result<Json<MutationResponse>, AppError> {
    state.engine.delete_match(id).await?;
    Ok(Json(MutationResponse::ok()))
}
