use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::orders::{recalculate, refresh_status};
use crate::error::AppError;
use crate::models::negotiation::{Negotiation, NegotiationStatus, Party};
use crate::models::order::Order;
use crate::models::recipient::{DeliveryMode, RecipientStatus};
use crate::pricing;
use crate::state::{AppState, OrderEvent, OrderEventKind};

#[derive(Debug, Deserialize)]
pub struct ProposePrice {
    pub agent_id: Uuid,
    pub amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CounterOffer {
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptNegotiation {
    pub party: Party,
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RejectNegotiation {
    pub party: Party,
    pub actor_id: Uuid,
    pub reason: Option<String>,
}

/// Open a new price proposal from the assigned agent. Any negotiation still
/// pending on the recipient is superseded: it flips to rejected before the
/// new proposal is recorded.
pub async fn propose_price(
    state: &AppState,
    recipient_id: Uuid,
    req: ProposePrice,
) -> Result<Order, AppError> {
    if req.amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "proposed amount must be positive".to_string(),
        ));
    }

    let order_id = state.order_id_for_recipient(recipient_id)?;
    let mut order = state.lock_order(order_id).await?;

    let recipient = order
        .recipient_mut(recipient_id)
        .ok_or_else(|| AppError::NotFound(format!("recipient {recipient_id} not found")))?;

    if recipient.mode != DeliveryMode::Guided {
        return Err(AppError::InvalidState(
            "only guided recipients take price proposals".to_string(),
        ));
    }
    if recipient.status != RecipientStatus::Assigned {
        return Err(AppError::InvalidState(format!(
            "recipient is not negotiable (status {:?})",
            recipient.status
        )));
    }
    if recipient.assigned_agent != Some(req.agent_id) {
        return Err(AppError::Unauthorized(
            "only the assigned agent may propose a price".to_string(),
        ));
    }

    let now = Utc::now();
    for stale in recipient
        .negotiations
        .iter_mut()
        .filter(|n| n.status == NegotiationStatus::Pending)
    {
        stale.status = NegotiationStatus::Rejected;
        stale.resolved_at = Some(now);
    }

    let negotiation = Negotiation::new(recipient_id, req.amount, req.notes);
    let negotiation_id = negotiation.id;
    recipient.negotiations.push(negotiation);

    order.touch();
    state.index_negotiation(negotiation_id, order_id);
    state
        .metrics
        .negotiations_total
        .with_label_values(&["proposed"])
        .inc();

    let snapshot = order.clone();
    drop(order);
    state.publish(OrderEvent::new(&snapshot, OrderEventKind::PriceProposed));
    info!(
        order_id = %snapshot.id,
        recipient_id = %recipient_id,
        agent_id = %req.agent_id,
        amount = %req.amount,
        "price proposed"
    );

    Ok(snapshot)
}

pub async fn submit_counter_offer(
    state: &AppState,
    negotiation_id: Uuid,
    req: CounterOffer,
) -> Result<Order, AppError> {
    if req.amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "counter-offer amount must be positive".to_string(),
        ));
    }

    let order_id = state.order_id_for_negotiation(negotiation_id)?;
    let mut order = state.lock_order(order_id).await?;
    if order.customer_id != req.customer_id {
        return Err(AppError::Unauthorized(
            "only the ordering customer may counter".to_string(),
        ));
    }

    let (r_idx, n_idx) = locate(&order, negotiation_id)?;
    let negotiation = &order.recipients[r_idx].negotiations[n_idx];
    if negotiation.status != NegotiationStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "negotiation is not pending (status {:?})",
            negotiation.status
        )));
    }
    if negotiation.countered_by.is_some() {
        return Err(AppError::InvalidState(
            "negotiation was already countered".to_string(),
        ));
    }

    let negotiation = &mut order.recipients[r_idx].negotiations[n_idx];
    negotiation.counter_amount = Some(req.amount);
    negotiation.countered_by = Some(Party::Customer);
    negotiation.countered_at = Some(Utc::now());
    negotiation.round += 1;
    if req.notes.is_some() {
        negotiation.customer_notes = req.notes;
    }

    order.touch();
    state
        .metrics
        .negotiations_total
        .with_label_values(&["countered"])
        .inc();

    let snapshot = order.clone();
    drop(order);
    state.publish(OrderEvent::new(&snapshot, OrderEventKind::CounterOffered));
    info!(
        order_id = %snapshot.id,
        negotiation_id = %negotiation_id,
        amount = %req.amount,
        "counter-offer submitted"
    );

    Ok(snapshot)
}

/// Settle a negotiation. The customer may accept an uncountered agent
/// proposal; the agent may accept a customer counter-offer. The agreed base
/// plus any selected surcharges becomes the recipient's final price, and the
/// whole order's totals are recomputed.
pub async fn accept_negotiation(
    state: &AppState,
    negotiation_id: Uuid,
    req: AcceptNegotiation,
) -> Result<Order, AppError> {
    let order_id = state.order_id_for_negotiation(negotiation_id)?;
    let mut order = state.lock_order(order_id).await?;

    let (r_idx, n_idx) = locate(&order, negotiation_id)?;
    let recipient = &order.recipients[r_idx];
    let negotiation = &recipient.negotiations[n_idx];

    // Compare-and-set against a racing accept/counter/reject.
    if negotiation.status != NegotiationStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "negotiation is not pending (status {:?})",
            negotiation.status
        )));
    }

    match req.party {
        Party::Customer => {
            if order.customer_id != req.actor_id {
                return Err(AppError::Unauthorized(
                    "only the ordering customer may accept for the customer side".to_string(),
                ));
            }
            if negotiation.countered_by.is_some() {
                return Err(AppError::InvalidState(
                    "a countered proposal awaits the agent, not the customer".to_string(),
                ));
            }
        }
        Party::Agent => {
            if recipient.assigned_agent != Some(req.actor_id) {
                return Err(AppError::Unauthorized(
                    "only the assigned agent may accept for the agent side".to_string(),
                ));
            }
            if negotiation.countered_by != Some(Party::Customer) {
                return Err(AppError::InvalidState(
                    "the agent can only accept a customer counter-offer".to_string(),
                ));
            }
        }
    }

    let agreed = negotiation.agreed_amount();
    let now = Utc::now();

    let recipient = &mut order.recipients[r_idx];
    let negotiation = &mut recipient.negotiations[n_idx];
    negotiation.status = NegotiationStatus::Accepted;
    negotiation.resolved_at = Some(now);

    let (rush_fee, remote_fee) = pricing::surcharges(&recipient.service_options);
    recipient.base_price = Some(agreed);
    recipient.rush_fee = rush_fee;
    recipient.remote_fee = remote_fee;
    recipient.final_price = Some(agreed + rush_fee + remote_fee);

    // Guided prices reconcile by full recomputation rather than an
    // incremental delta: a re-negotiated recipient may already have
    // contributed to the totals.
    recalculate(&mut order);
    refresh_status(&mut order);
    order.touch();
    state
        .metrics
        .negotiations_total
        .with_label_values(&["accepted"])
        .inc();

    let snapshot = order.clone();
    drop(order);
    state.publish(OrderEvent::new(&snapshot, OrderEventKind::NegotiationAccepted));
    info!(
        order_id = %snapshot.id,
        negotiation_id = %negotiation_id,
        agreed = %agreed,
        "negotiation accepted"
    );

    Ok(snapshot)
}

/// Turn down a negotiation. A customer rejecting an agent proposal releases
/// the recipient back to the open pool for reassignment.
pub async fn reject_negotiation(
    state: &AppState,
    negotiation_id: Uuid,
    req: RejectNegotiation,
) -> Result<Order, AppError> {
    let order_id = state.order_id_for_negotiation(negotiation_id)?;
    let mut order = state.lock_order(order_id).await?;

    let (r_idx, n_idx) = locate(&order, negotiation_id)?;
    let recipient = &order.recipients[r_idx];
    let negotiation = &recipient.negotiations[n_idx];

    if negotiation.status != NegotiationStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "negotiation is not pending (status {:?})",
            negotiation.status
        )));
    }

    match req.party {
        Party::Customer => {
            if order.customer_id != req.actor_id {
                return Err(AppError::Unauthorized(
                    "only the ordering customer may reject for the customer side".to_string(),
                ));
            }
            if negotiation.countered_by.is_some() {
                return Err(AppError::InvalidState(
                    "a countered proposal awaits the agent, not the customer".to_string(),
                ));
            }
        }
        Party::Agent => {
            if recipient.assigned_agent != Some(req.actor_id) {
                return Err(AppError::Unauthorized(
                    "only the assigned agent may reject for the agent side".to_string(),
                ));
            }
            if negotiation.countered_by != Some(Party::Customer) {
                return Err(AppError::InvalidState(
                    "the agent can only reject a customer counter-offer".to_string(),
                ));
            }
        }
    }

    let now = Utc::now();
    let customer_rejected = req.party == Party::Customer;

    let recipient = &mut order.recipients[r_idx];
    let negotiation = &mut recipient.negotiations[n_idx];
    negotiation.status = NegotiationStatus::Rejected;
    negotiation.resolved_at = Some(now);
    if req.reason.is_some() {
        match req.party {
            Party::Customer => negotiation.customer_notes = req.reason,
            Party::Agent => negotiation.agent_notes = req.reason,
        }
    }

    if customer_rejected {
        // The customer walked away from this agent's price: free the
        // recipient for a different agent.
        recipient.status = RecipientStatus::Open;
        recipient.assigned_agent = None;
    }

    refresh_status(&mut order);
    order.touch();
    state
        .metrics
        .negotiations_total
        .with_label_values(&["rejected"])
        .inc();

    let snapshot = order.clone();
    drop(order);
    state.publish(OrderEvent::new(&snapshot, OrderEventKind::NegotiationRejected));
    info!(
        order_id = %snapshot.id,
        negotiation_id = %negotiation_id,
        party = ?req.party,
        "negotiation rejected"
    );

    Ok(snapshot)
}

fn locate(order: &Order, negotiation_id: Uuid) -> Result<(usize, usize), AppError> {
    order
        .recipients
        .iter()
        .enumerate()
        .find_map(|(ri, r)| {
            r.negotiations
                .iter()
                .position(|n| n.id == negotiation_id)
                .map(|ni| (ri, ni))
        })
        .ok_or_else(|| AppError::NotFound(format!("negotiation {negotiation_id} not found")))
}
