//! Log entry layout.
//!
//! Each entry carries the routing fields `messageId`, `from` and `to` next to
//! the full JSON-serialized message under `data`.

use std::collections::HashMap;

use relayhub_database::Message;

use crate::error::{LogError, LogResult};

pub const FIELD_MESSAGE_ID: &str = "messageId";
pub const FIELD_FROM: &str = "from";
pub const FIELD_TO: &str = "to";
pub const FIELD_DATA: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub message_id: String,
    pub from: String,
    pub to: String,
    pub data: String,
}

impl LogEntry {
    pub fn from_message(message: &Message) -> LogResult<Self> {
        Ok(Self {
            message_id: message.id.clone(),
            from: message.from.clone(),
            to: message.to.clone(),
            data: serde_json::to_string(message)?,
        })
    }

    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (FIELD_MESSAGE_ID, self.message_id.clone()),
            (FIELD_FROM, self.from.clone()),
            (FIELD_TO, self.to.clone()),
            (FIELD_DATA, self.data.clone()),
        ]
    }

    pub fn from_fields(fields: &HashMap<String, String>) -> LogResult<Self> {
        let field = |name: &str| {
            fields
                .get(name)
                .cloned()
                .ok_or_else(|| LogError::Malformed(format!("missing field '{name}'")))
        };

        Ok(Self {
            message_id: field(FIELD_MESSAGE_ID)?,
            from: field(FIELD_FROM)?,
            to: field(FIELD_TO)?,
            data: field(FIELD_DATA)?,
        })
    }

    /// Decode the embedded message. Its id must agree with the routing field.
    pub fn message(&self) -> LogResult<Message> {
        let message: Message = serde_json::from_str(&self.data)?;
        if message.id != self.message_id {
            return Err(LogError::Malformed(format!(
                "entry id '{}' does not match payload id '{}'",
                self.message_id, message.id
            )));
        }
        Ok(message)
    }
}

/// An entry as handed out by a consumer-group read, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub id: String,
    pub fields: HashMap<String, String>,
}

impl RawEntry {
    pub fn decode(&self) -> LogResult<LogEntry> {
        LogEntry::from_fields(&self.fields)
    }
}
