use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::orders::refresh_status;
use crate::error::AppError;
use crate::models::attempt::{Attempt, GeoPoint};
use crate::models::order::Order;
use crate::models::recipient::RecipientStatus;
use crate::state::{AppState, OrderEvent, OrderEventKind};

#[derive(Debug, Deserialize)]
pub struct RecordAttempt {
    pub agent_id: Uuid,
    pub successful: bool,
    pub notes: Option<String>,
    pub location: GeoPoint,
    pub photo_ref: Option<String>,
}

/// Record one delivery attempt. Success delivers the recipient; exhausting
/// the attempt cap fails it (pay-on-attempt: the agent keeps the payout for
/// the exhausted attempts); anything else keeps the recipient in progress.
pub async fn record_attempt(
    state: &AppState,
    recipient_id: Uuid,
    req: RecordAttempt,
) -> Result<Order, AppError> {
    if !req.location.is_valid() {
        return Err(AppError::Validation(
            "attempt requires valid geo coordinates".to_string(),
        ));
    }

    let order_id = state.order_id_for_recipient(recipient_id)?;
    let mut order = state.lock_order(order_id).await?;
    let customer_id = order.customer_id;

    let Some(r_idx) = order.recipients.iter().position(|r| r.id == recipient_id) else {
        return Err(AppError::NotFound(format!(
            "recipient {recipient_id} not found"
        )));
    };

    let recipient = &order.recipients[r_idx];
    if recipient.status.is_terminal() {
        return Err(AppError::InvalidState(format!(
            "recipient delivery already settled (status {:?})",
            recipient.status
        )));
    }
    match recipient.assigned_agent {
        Some(agent) if agent == req.agent_id => {}
        Some(_) => {
            return Err(AppError::Unauthorized(
                "attempts must come from the assigned agent".to_string(),
            ));
        }
        None => {
            return Err(AppError::InvalidState(
                "recipient has no assigned agent".to_string(),
            ));
        }
    }

    let now = Utc::now();
    let recipient = &mut order.recipients[r_idx];
    recipient.attempt_count += 1;
    let number = recipient.attempt_count;
    recipient.attempts.push(Attempt {
        id: Uuid::new_v4(),
        recipient_id,
        agent_id: req.agent_id,
        number,
        successful: req.successful,
        notes: req.notes,
        location: req.location,
        photo_ref: req.photo_ref,
        valid: true,
        recorded_at: now,
    });

    let outcome = if req.successful {
        recipient.status = RecipientStatus::Delivered;
        recipient.delivered_at = Some(now);
        "delivered"
    } else if number >= recipient.max_attempts {
        recipient.status = RecipientStatus::Failed;
        "failed"
    } else {
        recipient.status = RecipientStatus::InProgress;
        "retrying"
    };

    let first_delivery = req.successful
        && order
            .recipients
            .iter()
            .filter(|r| r.status == RecipientStatus::Delivered)
            .count()
            == 1;

    refresh_status(&mut order);
    order.touch();
    state
        .metrics
        .attempts_total
        .with_label_values(&[outcome])
        .inc();

    let snapshot = order.clone();
    drop(order);
    state.publish(OrderEvent::new(&snapshot, OrderEventKind::AttemptRecorded));

    // Collaborator notifications run outside the lock; their failure never
    // rolls back the recorded attempt.
    if let Err(err) = state
        .agent_stats
        .record_delivery_outcome(req.agent_id, req.successful, number)
        .await
    {
        warn!(agent_id = %req.agent_id, error = %err, "agent stats sink unavailable");
    }
    if first_delivery {
        if let Err(err) = state
            .contact_list
            .auto_add_agent(customer_id, req.agent_id)
            .await
        {
            warn!(customer_id = %customer_id, error = %err, "contact list sink unavailable");
        }
    }

    info!(
        order_id = %snapshot.id,
        recipient_id = %recipient_id,
        attempt = number,
        outcome,
        "attempt recorded"
    );

    Ok(snapshot)
}
