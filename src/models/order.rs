use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::recipient::Recipient;
use crate::pricing::PaymentSplit;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Bidding,
    PartiallyAssigned,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// A delivery job: the aggregate root owning its recipients and, through
/// them, all bids, negotiations and attempts. The five monetary totals are
/// always the sum of per-recipient contributions and are only ever written
/// by the order engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub customer_payment: Decimal,
    pub agent_payout: Decimal,
    pub platform_commission: Decimal,
    pub platform_fee: Decimal,
    pub tenant_profit: Decimal,
    /// Commission rate (percent) applied on the bidding path, recorded when
    /// first used so recalculation reproduces it.
    pub commission_rate: Decimal,
    pub modification_count: u32,
    pub recipients: Vec<Recipient>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        customer_id: Uuid,
        tenant_id: Uuid,
        order_number: String,
        deadline: Option<DateTime<Utc>>,
        commission_rate: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            customer_id,
            order_number,
            status: OrderStatus::Open,
            deadline,
            customer_payment: Decimal::ZERO,
            agent_payout: Decimal::ZERO,
            platform_commission: Decimal::ZERO,
            platform_fee: Decimal::ZERO,
            tenant_profit: Decimal::ZERO,
            commission_rate,
            modification_count: 0,
            recipients: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn recipient(&self, recipient_id: Uuid) -> Option<&Recipient> {
        self.recipients.iter().find(|r| r.id == recipient_id)
    }

    pub fn recipient_mut(&mut self, recipient_id: Uuid) -> Option<&mut Recipient> {
        self.recipients.iter_mut().find(|r| r.id == recipient_id)
    }

    /// Add one recipient's contribution to the running totals.
    pub fn apply_split(&mut self, split: &PaymentSplit) {
        self.customer_payment += split.customer_payment;
        self.agent_payout += split.agent_payout;
        self.platform_commission += split.platform_commission;
        self.platform_fee += split.platform_fee;
        self.tenant_profit += split.tenant_profit;
    }

    pub fn reset_totals(&mut self) {
        self.customer_payment = Decimal::ZERO;
        self.agent_payout = Decimal::ZERO;
        self.platform_commission = Decimal::ZERO;
        self.platform_fee = Decimal::ZERO;
        self.tenant_profit = Decimal::ZERO;
    }

    pub fn touch(&mut self) {
        self.modification_count += 1;
        self.updated_at = Utc::now();
    }
}
