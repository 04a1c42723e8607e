//! Append-only audit trail.
//!
//! Entries are written on the caller's connection so they commit or roll
//! back together with the change they describe.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::{ServiceResult, map_sqlx_error};

pub const MODULE_SALES: &str = "sales";
pub const MODULE_INVENTORY: &str = "inventory";
pub const MODULE_RECEIVING: &str = "receiving";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub actor: String,
    pub action: String,
    pub module: String,
    pub record_id: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// What happened, to which record, by whom.
#[derive(Debug, Clone, Copy)]
pub struct AuditRecord<'a> {
    pub actor: &'a str,
    pub action: &'a str,
    pub module: &'a str,
    pub record_id: &'a str,
    pub summary: &'a str,
}

pub async fn record(
    conn: &mut SqliteConnection,
    entry: AuditRecord<'_>,
    at: DateTime<Utc>,
) -> ServiceResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (actor, action, module, record_id, summary, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(entry.actor)
    .bind(entry.action)
    .bind(entry.module)
    .bind(entry.record_id)
    .bind(entry.summary)
    .bind(at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("audit_record", e))?;
    Ok(())
}

/// History of one record, oldest first.
pub async fn entries_for(
    pool: &SqlitePool,
    module: &str,
    record_id: &str,
) -> ServiceResult<Vec<AuditEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, actor, action, module, record_id, summary, created_at
        FROM audit_log
        WHERE module = ?1 AND record_id = ?2
        ORDER BY id ASC
        "#,
    )
    .bind(module)
    .bind(record_id)
    .fetch_all(pool)
    .await
    .map_err(|e| map_sqlx_error("audit_entries_for", e))?;

    rows.iter()
        .map(|row| {
            Ok(AuditEntry {
                id: row.try_get("id")?,
                actor: row.try_get("actor")?,
                action: row.try_get("action")?,
                module: row.try_get("module")?,
                record_id: row.try_get("record_id")?,
                summary: row.try_get("summary")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| map_sqlx_error("audit_entries_for", e))
}
