//! WebSocket wire frames.
//!
//! Both directions are JSON objects discriminated by a `type` field.

use relayhub_database::{Attachment, BeingStatus, Message};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Message {
        to: String,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        topic: Option<String>,
        #[serde(default)]
        attachments: Vec<Attachment>,
        #[serde(default, rename = "replyTo")]
        reply_to: Option<String>,
    },
    Presence {
        status: BeingStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Message {
        #[serde(rename = "messageId")]
        message_id: String,
        from: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        #[serde(default)]
        attachments: Vec<Attachment>,
        #[serde(default, rename = "replyTo", skip_serializing_if = "Option::is_none")]
        reply_to: Option<String>,
    },
    Ack {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    Presence {
        being: String,
        status: BeingStatus,
    },
    Error {
        error: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("invalid frame: {0}")]
    Invalid(String),
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| FrameError::InvalidJson(e.to_string()))?;
        let frame: ClientFrame =
            serde_json::from_value(value).map_err(|e| FrameError::Invalid(e.to_string()))?;

        if let ClientFrame::Message { to, .. } = &frame {
            if to.trim().is_empty() {
                return Err(FrameError::Invalid("recipient 'to' is required".into()));
            }
        }
        Ok(frame)
    }
}

impl ServerFrame {
    pub fn message(message: &Message) -> Self {
        ServerFrame::Message {
            message_id: message.id.clone(),
            from: message.from.clone(),
            to: message.to.clone(),
            body: message.body.clone(),
            topic: message.topic.clone(),
            attachments: message.attachments.clone(),
            reply_to: message.reply_to.clone(),
        }
    }

    pub fn ack(message_id: impl Into<String>) -> Self {
        ServerFrame::Ack {
            message_id: message_id.into(),
        }
    }

    pub fn presence(being: impl Into<String>, status: BeingStatus) -> Self {
        ServerFrame::Presence {
            being: being.into(),
            status,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        ServerFrame::Error {
            error: error.into(),
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|error| {
            tracing::error!(%error, "failed to encode server frame");
            r#"{"type":"error","error":"internal error"}"#.to_string()
        })
    }
}
