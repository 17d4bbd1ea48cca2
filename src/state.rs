use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};
use tokio::time::timeout;
use uuid::Uuid;

use crate::collaborators::{
    AgentStatsSink, ContactListSink, InMemoryTenantDirectory, LoggingSink, TenantDirectory,
};
use crate::config::Config;
use crate::error::AppError;
use crate::models::order::{Order, OrderStatus};
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum OrderEventKind {
    Created,
    BidPlaced,
    BidAccepted,
    AttemptRecorded,
    PriceProposed,
    CounterOffered,
    NegotiationAccepted,
    NegotiationRejected,
    TotalsRecalculated,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub kind: OrderEventKind,
    pub at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn new(order: &Order, kind: OrderEventKind) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            status: order.status,
            kind,
            at: Utc::now(),
        }
    }
}

/// Shared service state. Each order aggregate lives behind its own async
/// mutex; all mutations to one aggregate serialize on it while different
/// orders proceed in parallel.
pub struct AppState {
    orders: DashMap<Uuid, Arc<Mutex<Order>>>,
    recipient_index: DashMap<Uuid, Uuid>,
    bid_index: DashMap<Uuid, Uuid>,
    negotiation_index: DashMap<Uuid, Uuid>,
    customer_order_seq: DashMap<Uuid, u64>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub agent_stats: Arc<dyn AgentStatsSink>,
    pub contact_list: Arc<dyn ContactListSink>,
    pub order_events_tx: broadcast::Sender<OrderEvent>,
    pub metrics: Metrics,
    pub lock_wait: Duration,
    pub default_commission_rate: Decimal,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(InMemoryTenantDirectory::new(config.default_commission_rate)),
            Arc::new(LoggingSink),
            Arc::new(LoggingSink),
        )
    }

    pub fn with_collaborators(
        config: &Config,
        tenants: Arc<dyn TenantDirectory>,
        agent_stats: Arc<dyn AgentStatsSink>,
        contact_list: Arc<dyn ContactListSink>,
    ) -> Self {
        let (order_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            orders: DashMap::new(),
            recipient_index: DashMap::new(),
            bid_index: DashMap::new(),
            negotiation_index: DashMap::new(),
            customer_order_seq: DashMap::new(),
            tenants,
            agent_stats,
            contact_list,
            order_events_tx,
            metrics: Metrics::new(),
            lock_wait: Duration::from_millis(config.lock_wait_ms),
            default_commission_rate: config.default_commission_rate,
        }
    }

    /// Register a freshly created aggregate and its child lookups.
    pub fn insert_order(&self, order: Order) {
        for recipient in &order.recipients {
            self.recipient_index.insert(recipient.id, order.id);
        }
        self.orders.insert(order.id, Arc::new(Mutex::new(order)));
        self.metrics.orders_tracked.set(self.orders.len() as i64);
    }

    /// Acquire the aggregate lock with a bounded wait. A timeout surfaces as
    /// retryable `Busy` instead of blocking the caller indefinitely.
    pub async fn lock_order(&self, order_id: Uuid) -> Result<OwnedMutexGuard<Order>, AppError> {
        let handle = self
            .orders
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        match timeout(self.lock_wait, handle.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                self.metrics.lock_timeouts_total.inc();
                Err(AppError::Busy)
            }
        }
    }

    pub fn order_id_for_recipient(&self, recipient_id: Uuid) -> Result<Uuid, AppError> {
        self.recipient_index
            .get(&recipient_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| AppError::NotFound(format!("recipient {recipient_id} not found")))
    }

    pub fn order_id_for_bid(&self, bid_id: Uuid) -> Result<Uuid, AppError> {
        self.bid_index
            .get(&bid_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| AppError::NotFound(format!("bid {bid_id} not found")))
    }

    pub fn order_id_for_negotiation(&self, negotiation_id: Uuid) -> Result<Uuid, AppError> {
        self.negotiation_index
            .get(&negotiation_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| AppError::NotFound(format!("negotiation {negotiation_id} not found")))
    }

    pub fn index_bid(&self, bid_id: Uuid, order_id: Uuid) {
        self.bid_index.insert(bid_id, order_id);
    }

    pub fn index_negotiation(&self, negotiation_id: Uuid, order_id: Uuid) {
        self.negotiation_index.insert(negotiation_id, order_id);
    }

    /// Human-readable order number: `C<last4-of-customer>-ORD<n>` with a
    /// per-customer running counter.
    pub fn next_order_number(&self, customer_id: Uuid) -> String {
        let mut seq = self.customer_order_seq.entry(customer_id).or_insert(0);
        *seq += 1;
        let n = *seq;
        drop(seq);

        let hex = customer_id.simple().to_string();
        let tail = hex[hex.len() - 4..].to_uppercase();
        format!("C{tail}-ORD{n}")
    }

    pub fn publish(&self, event: OrderEvent) {
        // Nobody listening is fine.
        let _ = self.order_events_tx.send(event);
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}
