use axum::{
    extract::{Query, State},
    Json,
};

use stats::PeriodStats;
use store::{DateRange, Scope};

use crate::error::AppError;
use crate::models::StatsQuery;
use crate::state::AppState;

pub async fn period_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<PeriodStats>, AppError> {
    let range = DateRange::new(query.start, query.end)
        .ok_or_else(|| AppError::BadRequest("start must not be after end".into()))?;
    let stats = state
        .stats
        .period_stats(&range, &Scope::unrestricted(), query.kind)
        .await;
    Ok(Json(stats))
}
