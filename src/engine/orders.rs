use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{Order, OrderStatus};
use crate::models::recipient::{
    DEFAULT_MAX_ATTEMPTS, DeliveryMode, Recipient, RecipientStatus, ServiceOptions,
};
use crate::pricing::{self, GUIDED_COMMISSION_RATE, PaymentSplit, PricingPath};
use crate::state::{AppState, OrderEvent, OrderEventKind};

#[derive(Debug, Deserialize)]
pub struct NewRecipient {
    pub mode: DeliveryMode,
    pub name: String,
    pub street: String,
    pub city: String,
    pub zip: String,
    #[serde(default)]
    pub service_options: ServiceOptions,
    /// Pre-assigned agent; required for guided recipients, rejected for
    /// automated ones.
    pub agent_id: Option<Uuid>,
    /// Price already agreed with the pre-assigned agent, if any.
    pub agreed_price: Option<Decimal>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub customer_id: Uuid,
    pub tenant_id: Uuid,
    pub deadline: Option<DateTime<Utc>>,
    pub recipients: Vec<NewRecipient>,
}

pub fn create_order(state: &AppState, req: CreateOrder) -> Result<Order, AppError> {
    if req.recipients.is_empty() {
        return Err(AppError::Validation(
            "order requires at least one recipient".to_string(),
        ));
    }
    for (idx, item) in req.recipients.iter().enumerate() {
        validate_recipient(idx, item)?;
    }

    let order_number = state.next_order_number(req.customer_id);
    let mut order = Order::new(
        req.customer_id,
        req.tenant_id,
        order_number,
        req.deadline,
        state.default_commission_rate,
    );

    for (idx, item) in req.recipients.into_iter().enumerate() {
        let mut recipient = Recipient {
            id: Uuid::new_v4(),
            order_id: order.id,
            sequence: idx as u32 + 1,
            mode: item.mode,
            status: match item.mode {
                DeliveryMode::Guided => RecipientStatus::Assigned,
                DeliveryMode::Automated => RecipientStatus::Open,
            },
            name: item.name,
            street: item.street,
            city: item.city,
            zip: item.zip,
            service_options: item.service_options,
            assigned_agent: item.agent_id,
            attempt_count: 0,
            max_attempts: item.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            base_price: None,
            final_price: None,
            rush_fee: Decimal::ZERO,
            remote_fee: Decimal::ZERO,
            delivered_at: None,
            bids: Vec::new(),
            negotiations: Vec::new(),
            attempts: Vec::new(),
            created_at: Utc::now(),
        };

        // A guided recipient arriving with an agreed price is priced right
        // away; automated recipients contribute nothing until a bid wins.
        if let Some(agreed) = item.agreed_price {
            let (rush_fee, remote_fee) = pricing::surcharges(&recipient.service_options);
            recipient.base_price = Some(agreed);
            recipient.rush_fee = rush_fee;
            recipient.remote_fee = remote_fee;
            let final_price = agreed + rush_fee + remote_fee;
            recipient.final_price = Some(final_price);

            let split = pricing::split(final_price, GUIDED_COMMISSION_RATE, PricingPath::Guided);
            order.apply_split(&split);
        }

        order.recipients.push(recipient);
    }

    order.status = derive_order_status(&order);
    state.insert_order(order.clone());
    state.metrics.orders_created_total.inc();
    state.publish(OrderEvent::new(&order, OrderEventKind::Created));

    info!(
        order_id = %order.id,
        order_number = %order.order_number,
        recipients = order.recipients.len(),
        "order created"
    );

    Ok(order)
}

fn validate_recipient(idx: usize, item: &NewRecipient) -> Result<(), AppError> {
    if item.street.trim().is_empty() || item.city.trim().is_empty() || item.zip.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "recipient {}: street, city and zip are required",
            idx + 1
        )));
    }

    match item.mode {
        DeliveryMode::Guided => {
            if item.agent_id.is_none() {
                return Err(AppError::Validation(format!(
                    "recipient {}: guided delivery requires a pre-assigned agent",
                    idx + 1
                )));
            }
        }
        DeliveryMode::Automated => {
            if item.agent_id.is_some() {
                return Err(AppError::Validation(format!(
                    "recipient {}: agents are assigned to automated recipients by bidding",
                    idx + 1
                )));
            }
            if item.agreed_price.is_some() {
                return Err(AppError::Validation(format!(
                    "recipient {}: automated recipients are priced by bidding",
                    idx + 1
                )));
            }
        }
    }

    if let Some(agreed) = item.agreed_price {
        if agreed <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "recipient {}: agreed price must be positive",
                idx + 1
            )));
        }
    }
    if item.max_attempts == Some(0) {
        return Err(AppError::Validation(format!(
            "recipient {}: max attempts must be at least 1",
            idx + 1
        )));
    }

    Ok(())
}

/// Derive the order status from its recipients. Terminal outcomes win, then
/// in-flight delivery, then the assignment ladder.
pub fn derive_order_status(order: &Order) -> OrderStatus {
    if order.status == OrderStatus::Cancelled {
        return OrderStatus::Cancelled;
    }

    let recipients = &order.recipients;

    if recipients
        .iter()
        .all(|r| r.status == RecipientStatus::Delivered)
    {
        return OrderStatus::Completed;
    }
    // Any failure among all-terminal recipients fails the whole order.
    if recipients.iter().all(|r| r.status.is_terminal()) {
        return OrderStatus::Failed;
    }
    if recipients.iter().any(|r| r.attempt_count > 0) {
        return OrderStatus::InProgress;
    }

    let assigned = recipients.iter().filter(|r| r.status.is_assigned()).count();
    if assigned == recipients.len() {
        return OrderStatus::Assigned;
    }
    if assigned > 0 {
        return OrderStatus::PartiallyAssigned;
    }
    if recipients
        .iter()
        .any(|r| r.status == RecipientStatus::Bidding)
    {
        return OrderStatus::Bidding;
    }

    OrderStatus::Open
}

pub fn refresh_status(order: &mut Order) {
    let status = derive_order_status(order);
    order.status = status;
}

/// Recompute the five totals from current recipient state. Idempotent, and
/// the single sanctioned repair path for historically miscalculated orders.
pub fn recalculate(order: &mut Order) {
    let splits: Vec<PaymentSplit> = order
        .recipients
        .iter()
        .filter_map(|recipient| {
            let final_price = recipient.final_price?;
            Some(match recipient.mode {
                DeliveryMode::Automated => {
                    pricing::split(final_price, order.commission_rate, PricingPath::Bidding)
                }
                DeliveryMode::Guided => {
                    pricing::split(final_price, GUIDED_COMMISSION_RATE, PricingPath::Guided)
                }
            })
        })
        .collect();

    order.reset_totals();
    for split in &splits {
        order.apply_split(split);
    }
}

pub async fn recalculate_totals(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    let mut order = state.lock_order(order_id).await?;
    recalculate(&mut order);
    order.touch();

    let snapshot = order.clone();
    drop(order);
    state.publish(OrderEvent::new(&snapshot, OrderEventKind::TotalsRecalculated));
    info!(order_id = %snapshot.id, "order totals recalculated");

    Ok(snapshot)
}

pub async fn get_order(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    let order = state.lock_order(order_id).await?;
    Ok(order.clone())
}
