//! Shared application state for the gateway

use std::sync::Arc;

use relayhub_auth::CredentialGate;
use relayhub_config::RelayConfig;
use relayhub_database::{BeingRepository, MessageRepository};
use relayhub_stream::{MessageLog, StreamProducer};
use sqlx::SqlitePool;

use crate::consumer::{DeliverySettings, DeliveryWorker};
use crate::presence::PresenceService;
use crate::registry::ConnectionRegistry;
use crate::router::MessageRouter;

#[derive(Clone)]
pub struct GatewayState {
    pub pool: SqlitePool,
    pub gate: CredentialGate,
    pub registry: ConnectionRegistry,
    pub presence: PresenceService,
    pub router: MessageRouter,
    pub beings: BeingRepository,
    pub messages: MessageRepository,
    pub log: Arc<dyn MessageLog>,
    /// Frames buffered per connection before fast-path writes start failing.
    pub outbound_buffer: usize,
}

impl GatewayState {
    pub fn new(pool: SqlitePool, log: Arc<dyn MessageLog>, relay: &RelayConfig) -> Self {
        let beings = BeingRepository::new(pool.clone());
        let messages = MessageRepository::new(pool.clone());
        let registry = ConnectionRegistry::new();
        let presence = PresenceService::new(beings.clone(), registry.clone());
        let router = MessageRouter::new(
            registry.clone(),
            messages.clone(),
            StreamProducer::new(log.clone()),
            presence.clone(),
        );

        Self {
            pool,
            gate: CredentialGate::new(beings.clone()),
            registry,
            presence,
            router,
            beings,
            messages,
            log,
            outbound_buffer: relay.outbound_buffer.max(1),
        }
    }

    /// A delivery worker sharing this state's registry and record store.
    pub fn delivery_worker(&self, settings: DeliverySettings) -> DeliveryWorker {
        DeliveryWorker::new(
            self.log.clone(),
            self.registry.clone(),
            self.messages.clone(),
            settings,
        )
    }
}
