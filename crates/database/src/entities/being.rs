//! Being entity definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::DatabaseError;

/// An addressable client identity scoped to one organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Being {
    pub id: String,
    pub org_id: String,
    pub name: String,
    #[serde(skip_serializing, default)]
    pub token_hash: String,
    pub status: BeingStatus,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateBeingRequest {
    pub org_id: String,
    pub name: String,
    pub token_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeingStatus {
    Online,
    Offline,
    Away,
}

impl BeingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BeingStatus::Online => "online",
            BeingStatus::Offline => "offline",
            BeingStatus::Away => "away",
        }
    }
}

impl fmt::Display for BeingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BeingStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(BeingStatus::Online),
            "offline" => Ok(BeingStatus::Offline),
            "away" => Ok(BeingStatus::Away),
            other => Err(DatabaseError::CorruptRecord(format!(
                "unknown being status '{other}'"
            ))),
        }
    }
}
