use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::collaborators::{
    AgentStatsSink, ContactListSink, InMemoryTenantDirectory, LoggingSink, TenantDirectory,
};
use crate::config::Config;
use crate::engine::orders::{self, CreateOrder, NewRecipient};
use crate::error::AppError;
use crate::models::order::Order;
use crate::models::recipient::{DeliveryMode, ServiceOptions};
use crate::state::AppState;

pub(crate) fn config() -> Config {
    Config {
        http_port: 0,
        log_level: "info".to_string(),
        event_buffer_size: 64,
        lock_wait_ms: 100,
        default_commission_rate: dec!(20),
    }
}

pub(crate) fn state() -> Arc<AppState> {
    Arc::new(AppState::new(&config()))
}

pub(crate) fn state_with_tenants() -> (Arc<AppState>, Arc<InMemoryTenantDirectory>) {
    let cfg = config();
    let tenants = Arc::new(InMemoryTenantDirectory::new(cfg.default_commission_rate));
    let state = AppState::with_collaborators(
        &cfg,
        tenants.clone(),
        Arc::new(LoggingSink),
        Arc::new(LoggingSink),
    );
    (Arc::new(state), tenants)
}

pub(crate) fn state_with_failing_tenants() -> Arc<AppState> {
    let cfg = config();
    Arc::new(AppState::with_collaborators(
        &cfg,
        Arc::new(FailingCollaborator),
        Arc::new(LoggingSink),
        Arc::new(LoggingSink),
    ))
}

pub(crate) fn state_with_recording_sink() -> (Arc<AppState>, Arc<RecordingSink>) {
    let cfg = config();
    let sink = Arc::new(RecordingSink::default());
    let state = AppState::with_collaborators(
        &cfg,
        Arc::new(InMemoryTenantDirectory::new(cfg.default_commission_rate)),
        sink.clone(),
        sink.clone(),
    );
    (Arc::new(state), sink)
}

pub(crate) fn state_with_failing_sinks() -> Arc<AppState> {
    let cfg = config();
    Arc::new(AppState::with_collaborators(
        &cfg,
        Arc::new(InMemoryTenantDirectory::new(cfg.default_commission_rate)),
        Arc::new(FailingCollaborator),
        Arc::new(FailingCollaborator),
    ))
}

pub(crate) fn automated_recipient() -> NewRecipient {
    NewRecipient {
        mode: DeliveryMode::Automated,
        name: "Ada Lovelace".to_string(),
        street: "1 Analytical Way".to_string(),
        city: "Springfield".to_string(),
        zip: "62704".to_string(),
        service_options: ServiceOptions::default(),
        agent_id: None,
        agreed_price: None,
        max_attempts: None,
    }
}

pub(crate) fn guided_recipient(agent_id: Uuid, agreed_price: Option<Decimal>) -> NewRecipient {
    NewRecipient {
        mode: DeliveryMode::Guided,
        name: "Grace Hopper".to_string(),
        street: "2 Compiler Court".to_string(),
        city: "Arlington".to_string(),
        zip: "22202".to_string(),
        service_options: ServiceOptions::default(),
        agent_id: Some(agent_id),
        agreed_price,
        max_attempts: None,
    }
}

pub(crate) fn try_create_order(
    state: &AppState,
    recipients: Vec<NewRecipient>,
) -> Result<Order, AppError> {
    orders::create_order(
        state,
        CreateOrder {
            customer_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            deadline: None,
            recipients,
        },
    )
}

pub(crate) fn create_order_with(state: &AppState, recipients: Vec<NewRecipient>) -> Order {
    try_create_order(state, recipients).expect("test order is valid")
}

/// Collaborator double that always fails, for exercising fallback paths.
pub(crate) struct FailingCollaborator;

#[async_trait]
impl TenantDirectory for FailingCollaborator {
    async fn commission_rate(&self, _tenant_id: Uuid) -> Result<Decimal, AppError> {
        Err(AppError::Upstream("tenant service down".to_string()))
    }
}

#[async_trait]
impl AgentStatsSink for FailingCollaborator {
    async fn record_delivery_outcome(
        &self,
        _agent_id: Uuid,
        _successful: bool,
        _attempt_count: u32,
    ) -> Result<(), AppError> {
        Err(AppError::Upstream("stats service down".to_string()))
    }
}

#[async_trait]
impl ContactListSink for FailingCollaborator {
    async fn auto_add_agent(&self, _customer_id: Uuid, _agent_id: Uuid) -> Result<(), AppError> {
        Err(AppError::Upstream("contacts service down".to_string()))
    }
}

/// Collaborator double that records every call, for asserting sink traffic.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub outcomes: Mutex<Vec<(Uuid, bool, u32)>>,
    pub contacts: Mutex<Vec<(Uuid, Uuid)>>,
}

#[async_trait]
impl AgentStatsSink for RecordingSink {
    async fn record_delivery_outcome(
        &self,
        agent_id: Uuid,
        successful: bool,
        attempt_count: u32,
    ) -> Result<(), AppError> {
        self.outcomes
            .lock()
            .unwrap()
            .push((agent_id, successful, attempt_count));
        Ok(())
    }
}

#[async_trait]
impl ContactListSink for RecordingSink {
    async fn auto_add_agent(&self, customer_id: Uuid, agent_id: Uuid) -> Result<(), AppError> {
        self.contacts.lock().unwrap().push((customer_id, agent_id));
        Ok(())
    }
}
