//! Non-conformance record storage.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{SqliteConnection, SqlitePool};

use solderp_core::{InspectionId, NcrId};
use solderp_receiving::{NcrRequest, NonConformanceRecord};

use crate::error::{ServiceResult, map_sqlx_error};
use crate::rows::{column, parsed, parsed_opt};

/// Insert an open NCR on the caller's connection.
pub async fn create(
    conn: &mut SqliteConnection,
    request: NcrRequest,
    at: DateTime<Utc>,
) -> ServiceResult<NonConformanceRecord> {
    let ncr = NonConformanceRecord::open(request, NcrId::new(), at);
    sqlx::query(
        r#"
        INSERT INTO ncrs (id, ipn, qty, reference, inspection_id, description, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(ncr.id.to_string())
    .bind(ncr.ipn.as_str())
    .bind(ncr.qty)
    .bind(&ncr.reference)
    .bind(ncr.inspection_id.map(|id| id.to_string()))
    .bind(&ncr.description)
    .bind(&ncr.status)
    .bind(ncr.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("ncr_create", e))?;

    tracing::info!(ncr_id = %ncr.id, ipn = %ncr.ipn, qty = ncr.qty, "ncr opened");
    Ok(ncr)
}

pub async fn for_inspection(
    pool: &SqlitePool,
    inspection_id: InspectionId,
) -> ServiceResult<Vec<NonConformanceRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, ipn, qty, reference, inspection_id, description, status, created_at
        FROM ncrs
        WHERE inspection_id = ?1
        ORDER BY created_at ASC
        "#,
    )
    .bind(inspection_id.to_string())
    .fetch_all(pool)
    .await
    .map_err(|e| map_sqlx_error("ncr_for_inspection", e))?;

    rows.iter().map(decode).collect()
}

fn decode(row: &SqliteRow) -> ServiceResult<NonConformanceRecord> {
    Ok(NonConformanceRecord {
        id: parsed(row, "id")?,
        ipn: parsed(row, "ipn")?,
        qty: column(row, "qty")?,
        reference: column(row, "reference")?,
        inspection_id: parsed_opt(row, "inspection_id")?,
        description: column(row, "description")?,
        status: column(row, "status")?,
        created_at: column(row, "created_at")?,
    })
}
