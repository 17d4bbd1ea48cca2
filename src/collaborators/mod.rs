use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

/// Tenant configuration lookup. Implemented by the tenant service; the
/// bidding engine tolerates failure by falling back to the configured
/// default rate.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn commission_rate(&self, tenant_id: Uuid) -> Result<Decimal, AppError>;
}

/// Fire-and-forget delivery-outcome feed for agent statistics. Failures are
/// logged and never roll back the attempt that produced them.
#[async_trait]
pub trait AgentStatsSink: Send + Sync {
    async fn record_delivery_outcome(
        &self,
        agent_id: Uuid,
        successful: bool,
        attempt_count: u32,
    ) -> Result<(), AppError>;
}

/// Fire-and-forget contact-list integration, invoked once per order on its
/// first successful delivery.
#[async_trait]
pub trait ContactListSink: Send + Sync {
    async fn auto_add_agent(&self, customer_id: Uuid, agent_id: Uuid) -> Result<(), AppError>;
}

/// Per-tenant commission rates held in memory, with a default for tenants
/// that were never configured.
pub struct InMemoryTenantDirectory {
    rates: DashMap<Uuid, Decimal>,
    default_rate: Decimal,
}

impl InMemoryTenantDirectory {
    pub fn new(default_rate: Decimal) -> Self {
        Self {
            rates: DashMap::new(),
            default_rate,
        }
    }

    pub fn set_rate(&self, tenant_id: Uuid, rate: Decimal) {
        self.rates.insert(tenant_id, rate);
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn commission_rate(&self, tenant_id: Uuid) -> Result<Decimal, AppError> {
        Ok(self
            .rates
            .get(&tenant_id)
            .map(|entry| *entry.value())
            .unwrap_or(self.default_rate))
    }
}

/// Default sink used when no real collaborator is wired in: logs and drops.
pub struct LoggingSink;

#[async_trait]
impl AgentStatsSink for LoggingSink {
    async fn record_delivery_outcome(
        &self,
        agent_id: Uuid,
        successful: bool,
        attempt_count: u32,
    ) -> Result<(), AppError> {
        debug!(agent_id = %agent_id, successful, attempt_count, "delivery outcome recorded");
        Ok(())
    }
}

#[async_trait]
impl ContactListSink for LoggingSink {
    async fn auto_add_agent(&self, customer_id: Uuid, agent_id: Uuid) -> Result<(), AppError> {
        debug!(customer_id = %customer_id, agent_id = %agent_id, "agent added to contact list");
        Ok(())
    }
}
