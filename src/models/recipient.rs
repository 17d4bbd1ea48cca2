use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::attempt::Attempt;
use crate::models::bid::Bid;
use crate::models::negotiation::Negotiation;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Open competitive bidding; any agent may bid, the customer accepts one.
    Automated,
    /// Pre-assigned agent negotiates the price with the customer.
    Guided,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecipientStatus {
    Open,
    Pending,
    Bidding,
    Assigned,
    InProgress,
    Delivered,
    Failed,
}

impl RecipientStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecipientStatus::Delivered | RecipientStatus::Failed)
    }

    /// An agent is committed to this recipient (assignment happened and was
    /// not undone).
    pub fn is_assigned(&self) -> bool {
        matches!(
            self,
            RecipientStatus::Assigned
                | RecipientStatus::InProgress
                | RecipientStatus::Delivered
        )
    }

    pub fn accepts_bids(&self) -> bool {
        matches!(
            self,
            RecipientStatus::Open | RecipientStatus::Pending | RecipientStatus::Bidding
        )
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ServiceOptions {
    #[serde(default)]
    pub process_service: bool,
    #[serde(default)]
    pub certified_mail: bool,
    #[serde(default)]
    pub rush: bool,
    #[serde(default)]
    pub remote: bool,
}

/// One delivery target within an order. Owned exclusively by its order;
/// removed only when the order is removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: Uuid,
    pub order_id: Uuid,
    pub sequence: u32,
    pub mode: DeliveryMode,
    pub status: RecipientStatus,
    pub name: String,
    pub street: String,
    pub city: String,
    pub zip: String,
    pub service_options: ServiceOptions,
    pub assigned_agent: Option<Uuid>,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub base_price: Option<Decimal>,
    pub final_price: Option<Decimal>,
    pub rush_fee: Decimal,
    pub remote_fee: Decimal,
    pub delivered_at: Option<DateTime<Utc>>,
    pub bids: Vec<Bid>,
    pub negotiations: Vec<Negotiation>,
    pub attempts: Vec<Attempt>,
    pub created_at: DateTime<Utc>,
}

