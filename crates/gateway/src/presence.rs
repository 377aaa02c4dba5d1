use relayhub_auth::Identity;
use relayhub_database::{current_timestamp, BeingRepository, BeingStatus};
use tracing::{info, warn};

use crate::frames::ServerFrame;
use crate::registry::ConnectionRegistry;

/// Presence bookkeeping driven by the connection lifecycle.
#[derive(Clone)]
pub struct PresenceService {
    beings: BeingRepository,
    registry: ConnectionRegistry,
}

impl PresenceService {
    pub fn new(beings: BeingRepository, registry: ConnectionRegistry) -> Self {
        Self { beings, registry }
    }

    /// Mark the being online and tell the rest of its org.
    pub async fn connected(&self, identity: &Identity) -> usize {
        self.record(identity, BeingStatus::Online).await;
        let frame = ServerFrame::presence(&identity.being_id, BeingStatus::Online).encode();
        let notified = self
            .registry
            .broadcast(&identity.org_id, &frame, Some(&identity.being_id))
            .await;
        info!(being_id = %identity.being_id, org_id = %identity.org_id, notified, "being online");
        notified
    }

    /// Mark the being offline and tell its org. Call once per removed connection.
    ///
    /// If a successor connection registered after the removal, the stored
    /// status is put back to online and no offline event is sent.
    pub async fn disconnected(&self, identity: &Identity) -> usize {
        self.record(identity, BeingStatus::Offline).await;
        if self
            .registry
            .is_online(&identity.being_id, &identity.org_id)
            .await
        {
            self.record(identity, BeingStatus::Online).await;
            info!(being_id = %identity.being_id, "reconnected during teardown, staying online");
            return 0;
        }
        let frame = ServerFrame::presence(&identity.being_id, BeingStatus::Offline).encode();
        let notified = self
            .registry
            .broadcast(&identity.org_id, &frame, None)
            .await;
        info!(being_id = %identity.being_id, org_id = %identity.org_id, notified, "being offline");
        notified
    }

    /// Relay a client-declared status to the org without storing it.
    pub async fn announce(&self, identity: &Identity, status: BeingStatus) -> usize {
        let frame = ServerFrame::presence(&identity.being_id, status).encode();
        self.registry.broadcast(&identity.org_id, &frame, None).await
    }

    async fn record(&self, identity: &Identity, status: BeingStatus) {
        match self
            .beings
            .update_presence(&identity.being_id, status, current_timestamp())
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(being_id = %identity.being_id, "presence update for unknown being"),
            Err(error) => warn!(being_id = %identity.being_id, %error, "failed to record presence"),
        }
    }
}
