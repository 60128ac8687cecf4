use axum::{
    extract::{Path, State},
    Json,
};
use tracing::warn;

use store::SyncOrderStore;
use types::errors::ReconError;
use types::ids::SyncOrderId;
use types::sync::SyncTarget;

use crate::error::AppError;
use crate::models::{SyncOrderResponse, SyncRequest, SyncResponse};
use crate::state::AppState;

/// Accept a sync request and run the order in the background. The
/// response carries only the order id; progress is polled separately.
pub async fn trigger_sync(
    State(state): State<AppState>,
    Json(payload): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    let target = match payload.cabinet_id {
        Some(cabinet_id) => SyncTarget::OneCabinet { cabinet_id },
        None => SyncTarget::AllCabinets,
    };
    let order_id = state
        .ingestion
        .request_sync(target, payload.page_budget)
        .await?;

    let ingestion = state.ingestion.clone();
    tokio::spawn(async move {
        if let Err(err) = ingestion.run_order(order_id).await {
            warn!(order_id = %order_id, %err, "background sync order failed");
        }
    });

    Ok(Json(SyncResponse { order_id }))
}

pub async fn get_sync_order(
    State(state): State<AppState>,
    Path(id): Path<SyncOrderId>,
) -> Result<Json<SyncOrderResponse>, AppError> {
    let order = state.store.get_sync_order(id).map_err(ReconError::from)?;
    Ok(Json(SyncOrderResponse {
        order_id: id,
        status: order.status,
    }))
}
