//! Per-connection entry point for inbound frames.
//!
//! A message is persisted first, then appended to the durable log, then
//! offered to the recipient's live connection. The sender is acked once the
//! record exists, whatever happened to delivery.

use chrono::Utc;
use relayhub_auth::Identity;
use relayhub_database::{Attachment, Message, MessageRepository, MessagePriority};
use relayhub_stream::StreamProducer;
use tracing::{debug, error, warn};

use crate::frames::{ClientFrame, ServerFrame};
use crate::presence::PresenceService;
use crate::registry::{ConnectionHandle, ConnectionRegistry};

/// An authenticated connection as seen by the router.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub handle: ConnectionHandle,
}

impl Session {
    pub fn new(identity: Identity, handle: ConnectionHandle) -> Self {
        Self { identity, handle }
    }

    pub fn being_id(&self) -> &str {
        &self.identity.being_id
    }

    pub fn org_id(&self) -> &str {
        &self.identity.org_id
    }

    /// Queue a frame for this session's own socket.
    pub async fn reply(&self, frame: &ServerFrame) -> bool {
        self.handle.send(frame.encode()).await
    }
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Written to the recipient's live connection.
    Delivered { message_id: String },
    /// Fanned out to this many peers in the org.
    Broadcast { message_id: String, recipients: usize },
    /// Stored; the recipient was not reachable.
    Pending { message_id: String },
    /// Client presence relayed to this many connections.
    Presence { recipients: usize },
    /// Frame rejected; an error frame was sent.
    Rejected { reason: String },
    /// Store unavailable; an error frame was sent and nothing acked.
    Failed,
}

#[derive(Clone)]
pub struct MessageRouter {
    registry: ConnectionRegistry,
    messages: MessageRepository,
    producer: StreamProducer,
    presence: PresenceService,
}

impl MessageRouter {
    pub fn new(
        registry: ConnectionRegistry,
        messages: MessageRepository,
        producer: StreamProducer,
        presence: PresenceService,
    ) -> Self {
        Self {
            registry,
            messages,
            producer,
            presence,
        }
    }

    pub async fn handle_text(&self, session: &Session, text: &str) -> RouteOutcome {
        let frame = match ClientFrame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(being_id = session.being_id(), error = %err, "rejected inbound frame");
                let reason = err.to_string();
                session.reply(&ServerFrame::error(reason.clone())).await;
                return RouteOutcome::Rejected { reason };
            }
        };

        match frame {
            ClientFrame::Message {
                to,
                body,
                topic,
                attachments,
                reply_to,
            } => {
                self.route_message(session, to, body, topic, attachments, reply_to)
                    .await
            }
            ClientFrame::Presence { status } => {
                let recipients = self.presence.announce(&session.identity, status).await;
                RouteOutcome::Presence { recipients }
            }
        }
    }

    async fn route_message(
        &self,
        session: &Session,
        to: String,
        body: Option<String>,
        topic: Option<String>,
        attachments: Vec<Attachment>,
        reply_to: Option<String>,
    ) -> RouteOutcome {
        let mut message = Message::pending(session.org_id(), session.being_id(), to);
        message.body = body;
        message.topic = topic;
        message.attachments = attachments;
        message.reply_to = reply_to;
        message.priority = MessagePriority::Normal;

        if let Err(err) = self.messages.insert(&message).await {
            error!(being_id = session.being_id(), error = %err, "failed to store message");
            session.reply(&ServerFrame::error("internal error")).await;
            return RouteOutcome::Failed;
        }

        // The stored record stays authoritative when the append fails.
        let _ = self.producer.publish(&message).await;

        let payload = ServerFrame::message(&message).encode();
        let outcome = if message.is_broadcast() {
            let recipients = self
                .registry
                .broadcast(session.org_id(), &payload, Some(session.being_id()))
                .await;
            self.mark_delivered(&message.id).await;
            RouteOutcome::Broadcast {
                message_id: message.id.clone(),
                recipients,
            }
        } else if self
            .registry
            .send_to(&message.to, session.org_id(), &payload)
            .await
        {
            self.mark_delivered(&message.id).await;
            RouteOutcome::Delivered {
                message_id: message.id.clone(),
            }
        } else {
            debug!(message_id = %message.id, to = %message.to, "recipient offline, left pending");
            RouteOutcome::Pending {
                message_id: message.id.clone(),
            }
        };

        session.reply(&ServerFrame::ack(&message.id)).await;
        outcome
    }

    async fn mark_delivered(&self, message_id: &str) {
        if let Err(err) = self.messages.mark_delivered(message_id, Utc::now()).await {
            warn!(message_id, error = %err, "failed to mark message delivered");
        }
    }
}
