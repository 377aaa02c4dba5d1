//! Message entity definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{current_timestamp, DatabaseError};

/// Recipient sentinel addressing every connected being of the sender's organization.
pub const BROADCAST_RECIPIENT: &str = "*";

/// One relay attempt, persisted at ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub org_id: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub priority: MessagePriority,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl Message {
    /// A fresh pending message with a new id and normal priority.
    pub fn pending(org_id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: cuid2::create_id(),
            org_id: org_id.into(),
            from: from.into(),
            to: to.into(),
            topic: None,
            body: None,
            attachments: Vec::new(),
            priority: MessagePriority::Normal,
            status: MessageStatus::Pending,
            created_at: current_timestamp(),
            delivered_at: None,
            reply_to: None,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST_RECIPIENT
    }
}

/// Reference to a blob held by the attachment store. Bytes never pass through the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl MessagePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessagePriority::Low => "low",
            MessagePriority::Normal => "normal",
            MessagePriority::High => "high",
            MessagePriority::Urgent => "urgent",
        }
    }
}

impl FromStr for MessagePriority {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(MessagePriority::Low),
            "normal" => Ok(MessagePriority::Normal),
            "high" => Ok(MessagePriority::High),
            "urgent" => Ok(MessagePriority::Urgent),
            other => Err(DatabaseError::CorruptRecord(format!(
                "unknown message priority '{other}'"
            ))),
        }
    }
}

/// Delivery state. Transitions only move forward: pending to delivered or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }

    /// Whether a delivery path has already completed for this message.
    pub fn is_delivered(&self) -> bool {
        matches!(self, MessageStatus::Delivered | MessageStatus::Read)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(DatabaseError::CorruptRecord(format!(
                "unknown message status '{other}'"
            ))),
        }
    }
}

/// Filters for history lookups. All fields are optional and combined with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageQuery {
    pub org_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub topic: Option<String>,
    pub status: Option<MessageStatus>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}
