//! Repository for being identity and presence records.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::entities::{Being, BeingStatus, CreateBeingRequest};
use crate::types::{current_timestamp, format_timestamp, parse_timestamp, DatabaseError, DatabaseResult};

const BEING_COLUMNS: &str = "id, org_id, name, token_hash, status, created_at, last_seen";

#[derive(Clone)]
pub struct BeingRepository {
    pool: SqlitePool,
}

impl BeingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a being. Names are unique within an organization.
    pub async fn create(&self, request: &CreateBeingRequest) -> DatabaseResult<Being> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(DatabaseError::ValidationError("name is required".to_string()));
        }
        if request.org_id.trim().is_empty() {
            return Err(DatabaseError::ValidationError("org id is required".to_string()));
        }

        let now = current_timestamp();
        let being = Being {
            id: cuid2::create_id(),
            org_id: request.org_id.clone(),
            name: name.to_string(),
            token_hash: request.token_hash.clone(),
            status: BeingStatus::Offline,
            created_at: now,
            last_seen: now,
        };

        sqlx::query(
            "INSERT INTO beings (id, org_id, name, token_hash, status, created_at, last_seen)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&being.id)
        .bind(&being.org_id)
        .bind(&being.name)
        .bind(&being.token_hash)
        .bind(being.status.as_str())
        .bind(format_timestamp(&being.created_at))
        .bind(format_timestamp(&being.last_seen))
        .execute(&self.pool)
        .await
        .map_err(|error| match DatabaseError::from(error) {
            DatabaseError::Duplicate(_) => DatabaseError::Duplicate(format!(
                "being '{}' already exists in org '{}'",
                being.name, being.org_id
            )),
            other => other,
        })?;

        info!(being_id = %being.id, org_id = %being.org_id, "created being");
        Ok(being)
    }

    pub async fn find_by_id(&self, id: &str) -> DatabaseResult<Option<Being>> {
        let row = sqlx::query(&format!("SELECT {BEING_COLUMNS} FROM beings WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(being_from_row).transpose()
    }

    pub async fn list_by_org(&self, org_id: &str) -> DatabaseResult<Vec<Being>> {
        let rows = sqlx::query(&format!(
            "SELECT {BEING_COLUMNS} FROM beings WHERE org_id = ? ORDER BY name ASC"
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(being_from_row).collect()
    }

    pub async fn list_all(&self) -> DatabaseResult<Vec<Being>> {
        let rows = sqlx::query(&format!(
            "SELECT {BEING_COLUMNS} FROM beings ORDER BY org_id ASC, name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(being_from_row).collect()
    }

    /// Field-level presence update. Returns false when no such being exists.
    pub async fn update_presence(
        &self,
        id: &str,
        status: BeingStatus,
        last_seen: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query("UPDATE beings SET status = ?, last_seen = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(format_timestamp(&last_seen))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the stored credential hash. Returns false when no such being exists.
    pub async fn update_token_hash(&self, id: &str, token_hash: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("UPDATE beings SET token_hash = ? WHERE id = ?")
            .bind(token_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn being_from_row(row: &SqliteRow) -> DatabaseResult<Being> {
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let last_seen: String = row.try_get("last_seen")?;

    Ok(Being {
        id: row.try_get("id")?,
        org_id: row.try_get("org_id")?,
        name: row.try_get("name")?,
        token_hash: row.try_get("token_hash")?,
        status: status.parse()?,
        created_at: parse_timestamp(&created_at)?,
        last_seen: parse_timestamp(&last_seen)?,
    })
}
