use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

/// A competitive offer from an agent on an automated recipient. Any number
/// of bids may coexist; at most one ever reaches `Accepted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub agent_id: Uuid,
    pub amount: Decimal,
    pub comment: Option<String>,
    pub status: BidStatus,
    pub counter_amount: Option<Decimal>,
    pub counter_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    pub fn new(recipient_id: Uuid, agent_id: Uuid, amount: Decimal, comment: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            agent_id,
            amount,
            comment,
            status: BidStatus::Pending,
            counter_amount: None,
            counter_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
