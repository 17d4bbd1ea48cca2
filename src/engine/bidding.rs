use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::orders::refresh_status;
use crate::error::AppError;
use crate::models::bid::{Bid, BidStatus};
use crate::models::order::Order;
use crate::models::recipient::{DeliveryMode, RecipientStatus};
use crate::pricing::{self, PricingPath};
use crate::state::{AppState, OrderEvent, OrderEventKind};

#[derive(Debug, Deserialize)]
pub struct PlaceBid {
    pub agent_id: Uuid,
    pub amount: Decimal,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptBid {
    pub customer_id: Uuid,
}

pub async fn place_bid(
    state: &AppState,
    recipient_id: Uuid,
    req: PlaceBid,
) -> Result<Order, AppError> {
    if req.amount <= Decimal::ZERO {
        return Err(AppError::Validation("bid amount must be positive".to_string()));
    }

    let order_id = state.order_id_for_recipient(recipient_id)?;
    let mut order = state.lock_order(order_id).await?;

    let recipient = order
        .recipient_mut(recipient_id)
        .ok_or_else(|| AppError::NotFound(format!("recipient {recipient_id} not found")))?;

    if recipient.mode == DeliveryMode::Guided {
        return Err(AppError::InvalidState(
            "guided recipients are priced by negotiation, not bidding".to_string(),
        ));
    }
    if !recipient.status.accepts_bids() {
        return Err(AppError::InvalidState(format!(
            "recipient no longer accepts bids (status {:?})",
            recipient.status
        )));
    }

    let bid = Bid::new(recipient_id, req.agent_id, req.amount, req.comment);
    let bid_id = bid.id;
    if matches!(
        recipient.status,
        RecipientStatus::Open | RecipientStatus::Pending
    ) {
        recipient.status = RecipientStatus::Bidding;
    }
    recipient.bids.push(bid);

    refresh_status(&mut order);
    order.touch();
    state.index_bid(bid_id, order_id);
    state.metrics.bids_total.with_label_values(&["placed"]).inc();

    let snapshot = order.clone();
    drop(order);
    state.publish(OrderEvent::new(&snapshot, OrderEventKind::BidPlaced));
    info!(
        order_id = %snapshot.id,
        recipient_id = %recipient_id,
        agent_id = %req.agent_id,
        amount = %req.amount,
        "bid placed"
    );

    Ok(snapshot)
}

/// Accept one bid: the winner is marked, every other pending bid on the
/// recipient is rejected, the agent is assigned and the commission split is
/// folded into the order totals. The whole sequence happens under the
/// aggregate lock; the pre-checks act as a compare-and-set against a racing
/// accept.
pub async fn accept_bid(state: &AppState, bid_id: Uuid, req: AcceptBid) -> Result<Order, AppError> {
    let order_id = state.order_id_for_bid(bid_id)?;

    // The tenant lookup resolves before the critical section; the aggregate
    // lock is never held across a collaborator call.
    let tenant_id = { state.lock_order(order_id).await?.tenant_id };
    let rate = match state.tenants.commission_rate(tenant_id).await {
        Ok(rate) => rate,
        Err(err) => {
            warn!(
                tenant_id = %tenant_id,
                error = %err,
                "tenant commission lookup failed, using default rate"
            );
            state.default_commission_rate
        }
    };

    let mut order = state.lock_order(order_id).await?;
    if order.customer_id != req.customer_id {
        return Err(AppError::Unauthorized(
            "only the ordering customer may accept a bid".to_string(),
        ));
    }

    let Some((r_idx, b_idx)) = order.recipients.iter().enumerate().find_map(|(ri, r)| {
        r.bids.iter().position(|b| b.id == bid_id).map(|bi| (ri, bi))
    }) else {
        return Err(AppError::NotFound(format!("bid {bid_id} not found")));
    };

    // Compare-and-set: the observed bid and recipient state must still hold.
    let recipient = &order.recipients[r_idx];
    let bid = &recipient.bids[b_idx];
    if bid.status != BidStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "bid is no longer pending (status {:?})",
            bid.status
        )));
    }
    if !recipient.status.accepts_bids() {
        return Err(AppError::InvalidState(
            "recipient was already assigned".to_string(),
        ));
    }

    let amount = bid.amount;
    let agent_id = bid.agent_id;
    let now = Utc::now();

    let recipient = &mut order.recipients[r_idx];
    for (idx, other) in recipient.bids.iter_mut().enumerate() {
        if idx == b_idx {
            other.status = BidStatus::Accepted;
            other.updated_at = now;
        } else if other.status == BidStatus::Pending {
            other.status = BidStatus::Rejected;
            other.updated_at = now;
        }
    }
    recipient.assigned_agent = Some(agent_id);
    recipient.base_price = Some(amount);
    recipient.final_price = Some(amount);
    recipient.status = RecipientStatus::Assigned;

    order.commission_rate = rate;
    let split = pricing::split(amount, rate, PricingPath::Bidding);
    order.apply_split(&split);

    refresh_status(&mut order);
    order.touch();
    state
        .metrics
        .bids_total
        .with_label_values(&["accepted"])
        .inc();

    let snapshot = order.clone();
    drop(order);
    state.publish(OrderEvent::new(&snapshot, OrderEventKind::BidAccepted));
    info!(
        order_id = %snapshot.id,
        bid_id = %bid_id,
        agent_id = %agent_id,
        amount = %amount,
        rate = %rate,
        "bid accepted"
    );

    Ok(snapshot)
}
