//! Repository for message data access operations.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::entities::{Message, MessageQuery, MessageStatus};
use crate::types::{format_timestamp, parse_timestamp, DatabaseResult};

const MESSAGE_COLUMNS: &str = "id, org_id, from_being, to_being, topic, body, attachments, priority, status, created_at, delivered_at, reply_to";

pub const DEFAULT_QUERY_LIMIT: i64 = 100;
pub const MAX_QUERY_LIMIT: i64 = 1_000;

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a freshly ingested message.
    pub async fn insert(&self, message: &Message) -> DatabaseResult<()> {
        let attachments = serde_json::to_string(&message.attachments)?;

        sqlx::query(
            "INSERT INTO messages (id, org_id, from_being, to_being, topic, body, attachments, priority, status, created_at, delivered_at, reply_to)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.org_id)
        .bind(&message.from)
        .bind(&message.to)
        .bind(&message.topic)
        .bind(&message.body)
        .bind(attachments)
        .bind(message.priority.as_str())
        .bind(message.status.as_str())
        .bind(format_timestamp(&message.created_at))
        .bind(message.delivered_at.as_ref().map(format_timestamp))
        .bind(&message.reply_to)
        .execute(&self.pool)
        .await?;

        info!(
            message_id = %message.id,
            org_id = %message.org_id,
            from = %message.from,
            to = %message.to,
            "stored message"
        );
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> DatabaseResult<Option<Message>> {
        let row = sqlx::query(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(message_from_row).transpose()
    }

    pub async fn status_of(&self, id: &str) -> DatabaseResult<Option<MessageStatus>> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        status.map(|raw| raw.parse()).transpose()
    }

    /// Move a message from pending to delivered.
    ///
    /// Conditional on the current status, so concurrent delivery paths race
    /// safely: exactly one caller observes `true`, and a delivered or read
    /// message is never rewritten.
    pub async fn mark_delivered(&self, id: &str, delivered_at: DateTime<Utc>) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE messages SET status = ?, delivered_at = ? WHERE id = ? AND status = ?",
        )
        .bind(MessageStatus::Delivered.as_str())
        .bind(format_timestamp(&delivered_at))
        .bind(id)
        .bind(MessageStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        debug!(message_id = id, updated, "mark delivered");
        Ok(updated)
    }

    /// Newest-first history lookup.
    pub async fn query(&self, filter: &MessageQuery) -> DatabaseResult<Vec<Message>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE 1 = 1"));

        if let Some(org_id) = &filter.org_id {
            builder.push(" AND org_id = ").push_bind(org_id.clone());
        }
        if let Some(from) = &filter.from {
            builder.push(" AND from_being = ").push_bind(from.clone());
        }
        if let Some(to) = &filter.to {
            builder.push(" AND to_being = ").push_bind(to.clone());
        }
        if let Some(topic) = &filter.topic {
            builder.push(" AND topic = ").push_bind(topic.clone());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }

        builder
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(clamp_limit(filter.limit))
            .push(" OFFSET ")
            .push_bind(filter.skip.unwrap_or(0).max(0));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(message_from_row).collect()
    }

    /// Messages exchanged in either direction between two beings, newest first.
    pub async fn conversation(
        &self,
        first: &str,
        second: &str,
        org_id: Option<&str>,
        limit: Option<i64>,
    ) -> DatabaseResult<Vec<Message>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE ((from_being = "));
        builder
            .push_bind(first.to_string())
            .push(" AND to_being = ")
            .push_bind(second.to_string())
            .push(") OR (from_being = ")
            .push_bind(second.to_string())
            .push(" AND to_being = ")
            .push_bind(first.to_string())
            .push("))");

        if let Some(org_id) = org_id {
            builder.push(" AND org_id = ").push_bind(org_id.to_string());
        }

        builder
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(clamp_limit(limit));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(message_from_row).collect()
    }
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_QUERY_LIMIT).clamp(1, MAX_QUERY_LIMIT)
}

fn message_from_row(row: &SqliteRow) -> DatabaseResult<Message> {
    let attachments: String = row.try_get("attachments")?;
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let delivered_at: Option<String> = row.try_get("delivered_at")?;

    Ok(Message {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        from: row.try_get("from_being")?,
        to: row.try_get("to_being")?,
        topic: row.try_get("topic")?,
        body: row.try_get("body")?,
        attachments: serde_json::from_str(&attachments)?,
        priority: priority.parse()?,
        status: status.parse()?,
        created_at: parse_timestamp(&created_at)?,
        delivered_at: delivered_at.as_deref().map(parse_timestamp).transpose()?,
        reply_to: row.try_get("reply_to")?,
    })
}
