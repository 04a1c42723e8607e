//! Receiving inspection: goods receipt and one-time disposition.
//!
//! A disposition commits in one database transaction: the conditional
//! `inspected_at IS NULL` update, the ledger credit for passed units, the NCR
//! for failed units and the audit entry. A second disposition of the same
//! inspection matches no row and is reported as not found.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

use solderp_core::{InspectionId, NcrId};
use solderp_events::Notification;
use solderp_inventory::{LedgerDelta, po_reference};
use solderp_receiving::{
    Disposition, NcrRequest, NewReceipt, NonConformanceRecord, ReceivingInspection,
};

use crate::audit::{self, AuditRecord, MODULE_RECEIVING};
use crate::error::{ServiceError, ServiceResult, map_sqlx_error};
use crate::ledger;
use crate::ncr;
use crate::notify::SharedNotifier;
use crate::rows::{column, parsed};

const SELECT_INSPECTION: &str = r#"
    SELECT id, po_id, po_line_id, ipn, qty_received, qty_passed, qty_failed, qty_on_hold,
           inspector, inspected_at, notes, created_at
    FROM receiving_inspections
"#;

/// Result of a committed disposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispositionOutcome {
    pub inspection: ReceivingInspection,
    pub ncr: Option<NonConformanceRecord>,
}

impl DispositionOutcome {
    pub fn ncr_id(&self) -> Option<NcrId> {
        self.ncr.as_ref().map(|n| n.id)
    }
}

#[derive(Clone)]
pub struct ReceivingEngine {
    pool: SqlitePool,
    notifier: SharedNotifier,
}

impl ReceivingEngine {
    pub fn new(pool: SqlitePool, notifier: SharedNotifier) -> Self {
        Self { pool, notifier }
    }

    /// Record a goods receipt as a pending inspection. Stock is not credited
    /// until the inspection is disposed.
    #[instrument(skip(self, receipt), fields(po_id = %receipt.po_id, ipn = %receipt.ipn), err)]
    pub async fn record_receipt(
        &self,
        receipt: NewReceipt,
        actor: &str,
    ) -> ServiceResult<ReceivingInspection> {
        let now = Utc::now();
        let inspection = receipt.into_inspection(InspectionId::new(), now)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        ledger::ensure_exists(&mut tx, &inspection.ipn, now).await?;
        sqlx::query(
            r#"
            INSERT INTO receiving_inspections
                (id, po_id, po_line_id, ipn, qty_received, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(inspection.id.to_string())
        .bind(&inspection.po_id)
        .bind(inspection.po_line_id)
        .bind(inspection.ipn.as_str())
        .bind(inspection.qty_received)
        .bind(&inspection.notes)
        .bind(inspection.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_receiving_inspection", e))?;
        audit::record(
            &mut tx,
            AuditRecord {
                actor,
                action: "receive",
                module: MODULE_RECEIVING,
                record_id: &inspection.id.to_string(),
                summary: &format!(
                    "po={} line={} ipn={} qty_received={}",
                    inspection.po_id, inspection.po_line_id, inspection.ipn, inspection.qty_received
                ),
            },
            now,
        )
        .await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        tracing::info!(inspection_id = %inspection.id, "receipt awaiting inspection");
        Ok(inspection)
    }

    pub async fn get(&self, id: InspectionId) -> ServiceResult<ReceivingInspection> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        fetch(&mut conn, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("receiving inspection {id} not found")))
    }

    /// Inspections not yet disposed, oldest first.
    pub async fn list_pending(&self, limit: i64) -> ServiceResult<Vec<ReceivingInspection>> {
        let rows = sqlx::query(&format!(
            "{SELECT_INSPECTION} WHERE inspected_at IS NULL ORDER BY created_at ASC, rowid ASC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_pending_inspections", e))?;
        rows.iter().map(decode).collect()
    }

    pub async fn ncrs_for(&self, id: InspectionId) -> ServiceResult<Vec<NonConformanceRecord>> {
        ncr::for_inspection(&self.pool, id).await
    }

    /// Classify a pending inspection into passed / failed / on-hold units.
    ///
    /// Passed units are credited to the ledger as a `receive` against
    /// `PO:<po id>`; failed units open an NCR; on-hold units stay out of stock.
    #[instrument(
        skip(self, disposition),
        fields(
            inspection_id = %id,
            qty_passed = disposition.qty_passed,
            qty_failed = disposition.qty_failed,
            qty_on_hold = disposition.qty_on_hold
        ),
        err
    )]
    pub async fn dispose(
        &self,
        id: InspectionId,
        disposition: Disposition,
    ) -> ServiceResult<DispositionOutcome> {
        disposition.validate()?;

        let mut inspection = self.get(id).await.map_err(|err| match err {
            ServiceError::NotFound(_) => ServiceError::not_found(format!(
                "receiving inspection {id} not found or already disposed"
            )),
            other => other,
        })?;
        let now = Utc::now();
        disposition.apply_to(&mut inspection, now)?;
        let ncr_request = disposition.ncr_request(&inspection);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let outcome = commit_disposition(&mut tx, &inspection, &disposition, ncr_request, now).await;
        let ncr = match outcome {
            Ok(ncr) => ncr,
            Err(err) => {
                tracing::warn!(inspection_id = %id, error = %err, "disposition rolled back");
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(err);
            }
        };
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        tracing::info!(
            inspection_id = %id,
            ipn = %inspection.ipn,
            ncr_id = ?ncr.as_ref().map(|n| n.id),
            "inspection disposed"
        );
        self.notifier.notify(Notification::InspectionDisposed {
            inspection_id: id,
            ipn: inspection.ipn.clone(),
            qty_passed: inspection.qty_passed,
            qty_failed: inspection.qty_failed,
            qty_on_hold: inspection.qty_on_hold,
            ncr_id: ncr.as_ref().map(|n| n.id),
            occurred_at: now,
        });

        Ok(DispositionOutcome { inspection, ncr })
    }
}

async fn commit_disposition(
    conn: &mut SqliteConnection,
    inspection: &ReceivingInspection,
    disposition: &Disposition,
    ncr_request: Option<NcrRequest>,
    at: DateTime<Utc>,
) -> ServiceResult<Option<NonConformanceRecord>> {
    let result = sqlx::query(
        r#"
        UPDATE receiving_inspections
        SET qty_passed = ?1,
            qty_failed = ?2,
            qty_on_hold = ?3,
            inspector = ?4,
            inspected_at = ?5,
            notes = ?6
        WHERE id = ?7 AND inspected_at IS NULL
        "#,
    )
    .bind(inspection.qty_passed)
    .bind(inspection.qty_failed)
    .bind(inspection.qty_on_hold)
    .bind(inspection.inspector.as_deref())
    .bind(at)
    .bind(&inspection.notes)
    .bind(inspection.id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("dispose_inspection", e))?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found(format!(
            "receiving inspection {} not found or already disposed",
            inspection.id
        )));
    }

    if inspection.qty_passed > 0 {
        let delta = LedgerDelta::receive(
            inspection.ipn.clone(),
            inspection.qty_passed,
            po_reference(&inspection.po_id),
            format!("receiving inspection {}", inspection.id),
        )?;
        ledger::ensure_exists(conn, &inspection.ipn, at).await?;
        ledger::apply_delta(conn, &delta, at).await?;
    }

    let ncr = match ncr_request {
        Some(request) => Some(ncr::create(conn, request, at).await?),
        None => None,
    };

    let mut summary = disposition.audit_summary();
    if let Some(ncr) = &ncr {
        summary.push_str(&format!(" ncr={}", ncr.id));
    }
    audit::record(
        conn,
        AuditRecord {
            actor: disposition.inspector.trim(),
            action: "dispose",
            module: MODULE_RECEIVING,
            record_id: &inspection.id.to_string(),
            summary: &summary,
        },
        at,
    )
    .await?;

    Ok(ncr)
}

async fn fetch(
    conn: &mut SqliteConnection,
    id: InspectionId,
) -> ServiceResult<Option<ReceivingInspection>> {
    let row = sqlx::query(&format!("{SELECT_INSPECTION} WHERE id = ?1"))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("load_receiving_inspection", e))?;
    row.as_ref().map(decode).transpose()
}

fn decode(row: &SqliteRow) -> ServiceResult<ReceivingInspection> {
    Ok(ReceivingInspection {
        id: parsed(row, "id")?,
        po_id: column(row, "po_id")?,
        po_line_id: column(row, "po_line_id")?,
        ipn: parsed(row, "ipn")?,
        qty_received: column(row, "qty_received")?,
        qty_passed: column(row, "qty_passed")?,
        qty_failed: column(row, "qty_failed")?,
        qty_on_hold: column(row, "qty_on_hold")?,
        inspector: column(row, "inspector")?,
        inspected_at: column(row, "inspected_at")?,
        notes: column(row, "notes")?,
        created_at: column(row, "created_at")?,
    })
}
