//! Inventory ledger storage.
//!
//! Quantities change only through increment-in-place statements, each paired
//! with one appended `inventory_transactions` row on the same connection. The
//! stage services call the `pub(crate)` primitives inside their own database
//! transaction; [`Ledger`] wraps them for standalone use.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

use solderp_core::{DomainError, Ipn};
use solderp_events::Notification;
use solderp_inventory::{InventoryRecord, InventoryTransaction, LedgerDelta, TransactionType};

use crate::audit::{self, AuditRecord, MODULE_INVENTORY};
use crate::error::{ServiceError, ServiceResult, map_sqlx_error};
use crate::notify::SharedNotifier;
use crate::rows::{column, parsed};

/// Reference stamped on manual adjustments.
pub const ADJUSTMENT_REFERENCE: &str = "ADJ";

const SELECT_RECORD: &str = r#"
    SELECT ipn, qty_on_hand, qty_reserved, location, reorder_point, reorder_qty, updated_at
    FROM inventory
"#;

const SELECT_TRANSACTION: &str = r#"
    SELECT id, ipn, txn_type, quantity, on_hand_delta, reserved_delta, reference, notes, created_at
    FROM inventory_transactions
"#;

/// Create a zeroed record for `ipn` unless one exists.
pub(crate) async fn ensure_exists(
    conn: &mut SqliteConnection,
    ipn: &Ipn,
    at: DateTime<Utc>,
) -> ServiceResult<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory (ipn, qty_on_hand, qty_reserved, updated_at)
        VALUES (?1, 0, 0, ?2)
        ON CONFLICT (ipn) DO NOTHING
        "#,
    )
    .bind(ipn.as_str())
    .bind(at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("ensure_inventory_record", e))?;
    Ok(())
}

pub(crate) async fn fetch(
    conn: &mut SqliteConnection,
    ipn: &Ipn,
) -> ServiceResult<Option<InventoryRecord>> {
    let row = sqlx::query(&format!("{SELECT_RECORD} WHERE ipn = ?1"))
        .bind(ipn.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("fetch_inventory_record", e))?;
    row.as_ref().map(decode_record).transpose()
}

/// Apply `delta` in place and log it.
///
/// The delta is not re-validated here; a result that breaks a CHECK
/// constraint surfaces as a `Storage` error and the caller's transaction
/// must be dropped.
pub(crate) async fn apply_delta(
    conn: &mut SqliteConnection,
    delta: &LedgerDelta,
    at: DateTime<Utc>,
) -> ServiceResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE inventory
        SET qty_on_hand  = qty_on_hand + ?1,
            qty_reserved = qty_reserved + ?2,
            updated_at   = ?3
        WHERE ipn = ?4
        "#,
    )
    .bind(delta.on_hand_delta)
    .bind(delta.reserved_delta)
    .bind(at)
    .bind(delta.ipn.as_str())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("apply_ledger_delta", e))?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found(format!(
            "inventory record {} not found",
            delta.ipn
        )));
    }

    append_transaction(conn, delta, at).await
}

/// Move `delta.reserved_delta` units from available to reserved.
///
/// The availability check and the increment are one statement, so two
/// reservations racing for the same stock cannot both succeed.
pub(crate) async fn reserve(
    conn: &mut SqliteConnection,
    delta: &LedgerDelta,
    at: DateTime<Utc>,
) -> ServiceResult<()> {
    if delta.on_hand_delta != 0 || delta.reserved_delta <= 0 {
        return Err(DomainError::invariant(format!(
            "reservation for {} must only increase reserved stock",
            delta.ipn
        ))
        .into());
    }

    let result = sqlx::query(
        r#"
        UPDATE inventory
        SET qty_reserved = qty_reserved + ?1,
            updated_at   = ?2
        WHERE ipn = ?3
          AND qty_on_hand - qty_reserved >= ?1
        "#,
    )
    .bind(delta.reserved_delta)
    .bind(at)
    .bind(delta.ipn.as_str())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("reserve_inventory", e))?;

    if result.rows_affected() == 0 {
        let available = fetch(conn, &delta.ipn)
            .await?
            .map(|r| r.available())
            .unwrap_or(0);
        return Err(
            DomainError::insufficient(delta.ipn.as_str(), delta.reserved_delta, available).into(),
        );
    }

    append_transaction(conn, delta, at).await
}

async fn append_transaction(
    conn: &mut SqliteConnection,
    delta: &LedgerDelta,
    at: DateTime<Utc>,
) -> ServiceResult<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory_transactions
            (ipn, txn_type, quantity, on_hand_delta, reserved_delta, reference, notes, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(delta.ipn.as_str())
    .bind(delta.txn_type.as_str())
    .bind(delta.quantity())
    .bind(delta.on_hand_delta)
    .bind(delta.reserved_delta)
    .bind(&delta.reference)
    .bind(&delta.notes)
    .bind(at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("append_inventory_transaction", e))?;
    Ok(())
}

/// Publish a low-stock notification for every listed part at or below its
/// reorder point. Runs after commit; read failures are logged, not returned.
pub(crate) async fn announce_low_stock<'a, I>(pool: &SqlitePool, notifier: &SharedNotifier, ipns: I)
where
    I: IntoIterator<Item = &'a Ipn>,
{
    for ipn in ipns {
        let record = match pool.acquire().await {
            Ok(mut conn) => fetch(&mut conn, ipn).await,
            Err(e) => Err(map_sqlx_error("acquire", e)),
        };
        match record {
            Ok(Some(record)) if record.needs_reorder() => {
                tracing::info!(
                    ipn = %record.ipn,
                    qty_on_hand = record.qty_on_hand,
                    reorder_point = record.reorder_point,
                    "low stock"
                );
                notifier.notify(Notification::LowStock {
                    ipn: record.ipn,
                    qty_on_hand: record.qty_on_hand,
                    reorder_point: record.reorder_point,
                    reorder_qty: record.reorder_qty,
                    occurred_at: Utc::now(),
                });
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(%ipn, error = %err, "low-stock check skipped"),
        }
    }
}

fn decode_record(row: &SqliteRow) -> ServiceResult<InventoryRecord> {
    Ok(InventoryRecord {
        ipn: parsed(row, "ipn")?,
        qty_on_hand: column(row, "qty_on_hand")?,
        qty_reserved: column(row, "qty_reserved")?,
        location: column(row, "location")?,
        reorder_point: column(row, "reorder_point")?,
        reorder_qty: column(row, "reorder_qty")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn decode_transaction(row: &SqliteRow) -> ServiceResult<InventoryTransaction> {
    Ok(InventoryTransaction {
        id: column(row, "id")?,
        ipn: parsed(row, "ipn")?,
        txn_type: parsed::<TransactionType>(row, "txn_type")?,
        quantity: column(row, "quantity")?,
        on_hand_delta: column(row, "on_hand_delta")?,
        reserved_delta: column(row, "reserved_delta")?,
        reference: column(row, "reference")?,
        notes: column(row, "notes")?,
        created_at: column(row, "created_at")?,
    })
}

/// Standalone access to the ledger: queries, manual adjustments and reorder
/// thresholds.
#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
    notifier: SharedNotifier,
}

impl Ledger {
    pub fn new(pool: SqlitePool, notifier: SharedNotifier) -> Self {
        Self { pool, notifier }
    }

    #[instrument(skip(self), fields(ipn = %ipn), err)]
    pub async fn get(&self, ipn: &Ipn) -> ServiceResult<InventoryRecord> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        fetch(&mut conn, ipn)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("inventory record {ipn} not found")))
    }

    /// Return the record for `ipn`, creating a zeroed one on first reference.
    pub async fn ensure_exists(&self, ipn: &Ipn) -> ServiceResult<InventoryRecord> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        ensure_exists(&mut conn, ipn, Utc::now()).await?;
        fetch(&mut conn, ipn)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("inventory record {ipn} not found")))
    }

    pub async fn list(&self, limit: i64) -> ServiceResult<Vec<InventoryRecord>> {
        let rows = sqlx::query(&format!("{SELECT_RECORD} ORDER BY ipn ASC LIMIT ?1"))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_inventory", e))?;
        rows.iter().map(decode_record).collect()
    }

    /// Parts at or below a non-zero reorder point.
    pub async fn low_stock(&self) -> ServiceResult<Vec<InventoryRecord>> {
        let rows = sqlx::query(&format!(
            "{SELECT_RECORD} WHERE reorder_point > 0 AND qty_on_hand <= reorder_point ORDER BY ipn ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_low_stock", e))?;
        rows.iter().map(decode_record).collect()
    }

    /// Transaction history of one part, newest first.
    pub async fn transactions(
        &self,
        ipn: &Ipn,
        limit: i64,
    ) -> ServiceResult<Vec<InventoryTransaction>> {
        let rows = sqlx::query(&format!(
            "{SELECT_TRANSACTION} WHERE ipn = ?1 ORDER BY id DESC LIMIT ?2"
        ))
        .bind(ipn.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_inventory_transactions", e))?;
        rows.iter().map(decode_transaction).collect()
    }

    /// Every ledger row a document (e.g. `SO:<id>`) caused, oldest first.
    pub async fn transactions_for_reference(
        &self,
        reference: &str,
    ) -> ServiceResult<Vec<InventoryTransaction>> {
        let rows = sqlx::query(&format!(
            "{SELECT_TRANSACTION} WHERE reference = ?1 ORDER BY id ASC"
        ))
        .bind(reference)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions_for_reference", e))?;
        rows.iter().map(decode_transaction).collect()
    }

    /// Apply one delta in its own transaction.
    ///
    /// The delta is projected against the record read inside the same
    /// transaction, so a delta that would go negative or strand a
    /// reservation is rejected before any write. The CHECK constraints stay
    /// behind it as a last resort.
    #[instrument(skip(self, delta), fields(ipn = %delta.ipn, txn_type = %delta.txn_type), err)]
    pub async fn apply_delta(&self, delta: LedgerDelta) -> ServiceResult<InventoryRecord> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        ensure_exists(&mut tx, &delta.ipn, now).await?;
        let checked = match fetch(&mut tx, &delta.ipn).await {
            Ok(Some(current)) => delta.project(&current).map(|_| ()).map_err(ServiceError::from),
            Ok(None) => Err(ServiceError::not_found(format!(
                "inventory record {} not found",
                delta.ipn
            ))),
            Err(err) => Err(err),
        };
        if let Err(err) = checked {
            tracing::warn!(ipn = %delta.ipn, error = %err, "ledger delta rejected");
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(err);
        }
        if let Err(err) = apply_delta(&mut tx, &delta, now).await {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(err);
        }
        let record = fetch(&mut tx, &delta.ipn).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        if delta.on_hand_delta < 0 {
            announce_low_stock(&self.pool, &self.notifier, [&delta.ipn]).await;
        }
        record.ok_or_else(|| ServiceError::not_found(format!("inventory record {} not found", delta.ipn)))
    }

    /// Manual on-hand correction (cycle count, damage, found stock).
    ///
    /// Rejected up front when the result would go negative or drop below the
    /// reserved quantity.
    #[instrument(skip(self, notes), fields(ipn = %ipn), err)]
    pub async fn adjust(
        &self,
        ipn: &Ipn,
        qty_delta: i64,
        notes: &str,
        actor: &str,
    ) -> ServiceResult<InventoryRecord> {
        let delta = LedgerDelta::new(
            ipn.clone(),
            qty_delta,
            0,
            TransactionType::Adjust,
            ADJUSTMENT_REFERENCE,
            notes.trim(),
        )?;
        let current = self.ensure_exists(ipn).await?;
        delta.project(&current)?;

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        apply_delta(&mut tx, &delta, now).await?;
        audit::record(
            &mut tx,
            AuditRecord {
                actor,
                action: "adjust",
                module: MODULE_INVENTORY,
                record_id: ipn.as_str(),
                summary: &format!("qty_delta={qty_delta} notes={}", notes.trim()),
            },
            now,
        )
        .await?;
        let record = fetch(&mut tx, ipn).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        tracing::info!(%ipn, qty_delta, "inventory adjusted");
        if qty_delta < 0 {
            announce_low_stock(&self.pool, &self.notifier, [ipn]).await;
        }
        record.ok_or_else(|| ServiceError::not_found(format!("inventory record {ipn} not found")))
    }

    /// Set the low-stock trigger for a part; `reorder_point = 0` disables it.
    #[instrument(skip(self), fields(ipn = %ipn), err)]
    pub async fn set_reorder_thresholds(
        &self,
        ipn: &Ipn,
        reorder_point: i64,
        reorder_qty: i64,
        actor: &str,
    ) -> ServiceResult<InventoryRecord> {
        if reorder_point < 0 || reorder_qty < 0 {
            return Err(ServiceError::validation(format!(
                "reorder thresholds must not be negative, got point={reorder_point} qty={reorder_qty}"
            )));
        }

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        ensure_exists(&mut tx, ipn, now).await?;
        sqlx::query(
            r#"
            UPDATE inventory
            SET reorder_point = ?1, reorder_qty = ?2, updated_at = ?3
            WHERE ipn = ?4
            "#,
        )
        .bind(reorder_point)
        .bind(reorder_qty)
        .bind(now)
        .bind(ipn.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("set_reorder_thresholds", e))?;
        audit::record(
            &mut tx,
            AuditRecord {
                actor,
                action: "set_reorder",
                module: MODULE_INVENTORY,
                record_id: ipn.as_str(),
                summary: &format!("reorder_point={reorder_point} reorder_qty={reorder_qty}"),
            },
            now,
        )
        .await?;
        let record = fetch(&mut tx, ipn).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        record.ok_or_else(|| ServiceError::not_found(format!("inventory record {ipn} not found")))
    }
}
