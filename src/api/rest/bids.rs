use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::post;
use uuid::Uuid;

use crate::engine::bidding::{self, AcceptBid, PlaceBid};
use crate::error::AppError;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recipients/:id/bids", post(place_bid))
        .route("/bids/:id/accept", post(accept_bid))
}

async fn place_bid(
    State(state): State<Arc<AppState>>,
    Path(recipient_id): Path<Uuid>,
    Json(payload): Json<PlaceBid>,
) -> Result<Json<Order>, AppError> {
    let order = bidding::place_bid(&state, recipient_id, payload).await?;
    Ok(Json(order))
}

async fn accept_bid(
    State(state): State<Arc<AppState>>,
    Path(bid_id): Path<Uuid>,
    Json(payload): Json<AcceptBid>,
) -> Result<Json<Order>, AppError> {
    let order = bidding::accept_bid(&state, bid_id, payload).await?;
    Ok(Json(order))
}
