use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::post;
use uuid::Uuid;

use crate::engine::negotiation::{
    self, AcceptNegotiation, CounterOffer, ProposePrice, RejectNegotiation,
};
use crate::error::AppError;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recipients/:id/proposals", post(propose_price))
        .route("/negotiations/:id/counter", post(submit_counter_offer))
        .route("/negotiations/:id/accept", post(accept_negotiation))
        .route("/negotiations/:id/reject", post(reject_negotiation))
}

async fn propose_price(
    State(state): State<Arc<AppState>>,
    Path(recipient_id): Path<Uuid>,
    Json(payload): Json<ProposePrice>,
) -> Result<Json<Order>, AppError> {
    let order = negotiation::propose_price(&state, recipient_id, payload).await?;
    Ok(Json(order))
}

async fn submit_counter_offer(
    State(state): State<Arc<AppState>>,
    Path(negotiation_id): Path<Uuid>,
    Json(payload): Json<CounterOffer>,
) -> Result<Json<Order>, AppError> {
    let order = negotiation::submit_counter_offer(&state, negotiation_id, payload).await?;
    Ok(Json(order))
}

async fn accept_negotiation(
    State(state): State<Arc<AppState>>,
    Path(negotiation_id): Path<Uuid>,
    Json(payload): Json<AcceptNegotiation>,
) -> Result<Json<Order>, AppError> {
    let order = negotiation::accept_negotiation(&state, negotiation_id, payload).await?;
    Ok(Json(order))
}

async fn reject_negotiation(
    State(state): State<Arc<AppState>>,
    Path(negotiation_id): Path<Uuid>,
    Json(payload): Json<RejectNegotiation>,
) -> Result<Json<Order>, AppError> {
    let order = negotiation::reject_negotiation(&state, negotiation_id, payload).await?;
    Ok(Json(order))
}
