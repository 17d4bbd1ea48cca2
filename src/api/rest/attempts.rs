use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::post;
use uuid::Uuid;

use crate::engine::attempts::{self, RecordAttempt};
use crate::error::AppError;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/recipients/:id/attempts", post(record_attempt))
}

async fn record_attempt(
    State(state): State<Arc<AppState>>,
    Path(recipient_id): Path<Uuid>,
    Json(payload): Json<RecordAttempt>,
) -> Result<Json<Order>, AppError> {
    let order = attempts::record_attempt(&state, recipient_id, payload).await?;
    Ok(Json(order))
}
