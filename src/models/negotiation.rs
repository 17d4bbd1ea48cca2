use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Party {
    Agent,
    Customer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NegotiationStatus {
    Pending,
    Accepted,
    Rejected,
    /// Set by an external expiry timer, not by this core.
    Expired,
}

/// One proposal/counter-offer round on a guided recipient. At most one
/// negotiation per recipient is `Pending` at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Negotiation {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub proposed_by: Party,
    pub proposed_amount: Decimal,
    pub counter_amount: Option<Decimal>,
    pub countered_by: Option<Party>,
    pub status: NegotiationStatus,
    pub round: u32,
    pub agent_notes: Option<String>,
    pub customer_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub countered_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Negotiation {
    pub fn new(recipient_id: Uuid, proposed_amount: Decimal, agent_notes: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            proposed_by: Party::Agent,
            proposed_amount,
            counter_amount: None,
            countered_by: None,
            status: NegotiationStatus::Pending,
            round: 0,
            agent_notes,
            customer_notes: None,
            created_at: Utc::now(),
            countered_at: None,
            resolved_at: None,
        }
    }

    /// The amount both sides are settling on: the counter-offer when one
    /// exists, the original proposal otherwise.
    pub fn agreed_amount(&self) -> Decimal {
        self.counter_amount.unwrap_or(self.proposed_amount)
    }
}
