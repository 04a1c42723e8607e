//! Fulfillment: `allocated -> picked -> shipped -> invoiced`.
//!
//! Each stage is one database transaction that starts with the status
//! compare-and-swap. Shipping creates the outbound shipment and consumes the
//! reserved stock; invoicing creates the invoice. Both records exist at most
//! once per order (UNIQUE on `sales_order_id`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

use solderp_core::{DomainError, InvoiceId, Ipn, SalesOrderId, ShipmentId};
use solderp_inventory::{LedgerDelta, so_reference};
use solderp_invoicing::{Invoice, InvoiceStatus, TaxRate};
use solderp_sales::{OrderStatus, SalesOrder, Shipment, ShipmentLine, ShipmentStatus};

use crate::audit::{self, AuditRecord, MODULE_SALES};
use crate::error::{ServiceError, ServiceResult, map_sqlx_error};
use crate::ledger;
use crate::notify::SharedNotifier;
use crate::orders::{self, LineProgress, OrderService};
use crate::rows::{column, parsed};
use crate::state_machine::{self, Transition};

const SELECT_INVOICE: &str = r#"
    SELECT id, sales_order_id, total, tax, status, created_at
    FROM invoices
"#;

#[derive(Clone)]
pub struct FulfillmentPipeline {
    pool: SqlitePool,
    notifier: SharedNotifier,
    orders: OrderService,
    tax: TaxRate,
}

impl FulfillmentPipeline {
    pub fn new(pool: SqlitePool, notifier: SharedNotifier, tax: TaxRate) -> Self {
        let orders = OrderService::new(pool.clone(), notifier.clone());
        Self {
            pool,
            notifier,
            orders,
            tax,
        }
    }

    /// `allocated -> picked`: records the picked quantities, no stock moves.
    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn pick(&self, id: SalesOrderId, actor: &str) -> ServiceResult<SalesOrder> {
        let transition = Transition::prepare(&self.pool, id, OrderStatus::Picked).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        transition.claim(&mut tx).await?;
        orders::complete_lines(&mut tx, id, LineProgress::Picked).await?;
        transition.audit(&mut tx, actor, None).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        state_machine::announce(&transition, &self.notifier);
        self.orders.get(id).await
    }

    /// `picked -> shipped`: creates the outbound shipment and, per line,
    /// consumes on-hand stock and releases the matching reservation.
    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn ship(&self, id: SalesOrderId, actor: &str) -> ServiceResult<SalesOrder> {
        let transition = Transition::prepare(&self.pool, id, OrderStatus::Shipped).await?;
        self.check_reserved_stock(transition.order()).await?;

        let shipment = Shipment::outbound_for(transition.order(), ShipmentId::new(), transition.at());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        transition.claim(&mut tx).await?;
        if let Err(err) = ship_lines(&mut tx, transition.order(), &shipment, transition.at()).await {
            tracing::warn!(order_id = %id, error = %err, "shipment rolled back");
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(err);
        }
        let detail = format!("shipment={} units={}", shipment.id, shipment.total_units());
        transition.audit(&mut tx, actor, Some(&detail)).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        state_machine::announce(&transition, &self.notifier);
        let shipped: Vec<&Ipn> = transition.order().lines.iter().map(|l| &l.ipn).collect();
        ledger::announce_low_stock(&self.pool, &self.notifier, shipped).await;

        self.orders.get(id).await
    }

    /// `shipped -> invoiced`: creates an open invoice for the order total.
    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn invoice(&self, id: SalesOrderId, actor: &str) -> ServiceResult<SalesOrder> {
        let transition = Transition::prepare(&self.pool, id, OrderStatus::Invoiced).await?;
        let invoice = Invoice::for_order(transition.order(), self.tax, InvoiceId::new(), transition.at())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        transition.claim(&mut tx).await?;
        insert_invoice(&mut tx, &invoice).await?;
        let detail = format!(
            "invoice={} total={} tax={}",
            invoice.id, invoice.total, invoice.tax
        );
        transition.audit(&mut tx, actor, Some(&detail)).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        state_machine::announce(&transition, &self.notifier);
        self.orders.get(id).await
    }

    pub async fn shipment_for(&self, order_id: SalesOrderId) -> ServiceResult<Shipment> {
        let row = sqlx::query(
            r#"
            SELECT id, sales_order_id, shipment_type, status, created_at
            FROM shipments
            WHERE sales_order_id = ?1
            "#,
        )
        .bind(order_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_shipment", e))?
        .ok_or_else(|| ServiceError::not_found(format!("no shipment for sales order {order_id}")))?;

        let id: ShipmentId = parsed(&row, "id")?;
        let lines = sqlx::query(
            r#"
            SELECT ipn, qty, sales_order_id
            FROM shipment_lines
            WHERE shipment_id = ?1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_shipment_lines", e))?
        .iter()
        .map(|line| {
            Ok(ShipmentLine {
                ipn: parsed(line, "ipn")?,
                qty: column(line, "qty")?,
                sales_order_id: parsed(line, "sales_order_id")?,
            })
        })
        .collect::<ServiceResult<Vec<_>>>()?;

        Ok(Shipment {
            id,
            sales_order_id: parsed(&row, "sales_order_id")?,
            shipment_type: column(&row, "shipment_type")?,
            status: parse_shipment_status(&column::<String>(&row, "status")?)?,
            lines,
            created_at: column(&row, "created_at")?,
        })
    }

    pub async fn invoice_for(&self, order_id: SalesOrderId) -> ServiceResult<Invoice> {
        let row = sqlx::query(&format!("{SELECT_INVOICE} WHERE sales_order_id = ?1"))
            .bind(order_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_invoice", e))?
            .ok_or_else(|| ServiceError::not_found(format!("no invoice for sales order {order_id}")))?;
        decode_invoice(&row)
    }

    pub async fn get_invoice(&self, id: InvoiceId) -> ServiceResult<Invoice> {
        let row = sqlx::query(&format!("{SELECT_INVOICE} WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_invoice", e))?
            .ok_or_else(|| ServiceError::not_found(format!("invoice {id} not found")))?;
        decode_invoice(&row)
    }

    /// Re-derive an invoice's total and tax from its order lines.
    ///
    /// Returns the invoice as stored afterwards; an up-to-date invoice is
    /// left untouched.
    #[instrument(skip(self), fields(invoice_id = %id), err)]
    pub async fn recompute_invoice(&self, id: InvoiceId, actor: &str) -> ServiceResult<Invoice> {
        let mut invoice = self.get_invoice(id).await?;
        let order = self.orders.get(invoice.sales_order_id).await?;
        if !invoice.recompute(&order, self.tax)? {
            return Ok(invoice);
        }

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("UPDATE invoices SET total = ?1, tax = ?2 WHERE id = ?3")
            .bind(invoice.total)
            .bind(invoice.tax)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_invoice_totals", e))?;
        audit::record(
            &mut tx,
            AuditRecord {
                actor,
                action: "recompute_invoice",
                module: MODULE_SALES,
                record_id: &order.id.to_string(),
                summary: &format!("invoice={id} total={} tax={}", invoice.total, invoice.tax),
            },
            now,
        )
        .await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        tracing::info!(invoice_id = %id, total = invoice.total, "invoice recomputed");
        Ok(invoice)
    }

    /// Every part must hold its ordered quantity both on hand and reserved.
    async fn check_reserved_stock(&self, order: &SalesOrder) -> ServiceResult<()> {
        let mut needed: BTreeMap<&Ipn, i64> = BTreeMap::new();
        for line in &order.lines {
            *needed.entry(&line.ipn).or_default() += line.qty;
        }

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        let reference = so_reference(order.id);
        for (ipn, qty) in needed {
            let record = ledger::fetch(&mut conn, ipn)
                .await?
                .ok_or_else(|| ServiceError::not_found(format!("inventory record {ipn} not found")))?;
            if record.qty_reserved < qty {
                return Err(DomainError::invariant(format!(
                    "{ipn} has {} reserved, order {} ships {qty}",
                    record.qty_reserved, order.id
                ))
                .into());
            }
            LedgerDelta::ship(ipn.clone(), qty, reference.as_str())?.project(&record)?;
        }
        Ok(())
    }
}

async fn ship_lines(
    conn: &mut SqliteConnection,
    order: &SalesOrder,
    shipment: &Shipment,
    at: DateTime<Utc>,
) -> ServiceResult<()> {
    insert_shipment(conn, shipment).await?;

    let reference = so_reference(order.id);
    for line in &order.lines {
        let delta = LedgerDelta::ship(line.ipn.clone(), line.qty, reference.as_str())?;
        ledger::apply_delta(conn, &delta, at).await?;
    }
    orders::complete_lines(conn, order.id, LineProgress::Shipped).await
}

async fn insert_shipment(conn: &mut SqliteConnection, shipment: &Shipment) -> ServiceResult<()> {
    sqlx::query(
        r#"
        INSERT INTO shipments (id, sales_order_id, shipment_type, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(shipment.id.to_string())
    .bind(shipment.sales_order_id.to_string())
    .bind(&shipment.shipment_type)
    .bind(shipment.status.as_str())
    .bind(shipment.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_shipment", e))?;

    for (idx, line) in shipment.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO shipment_lines (shipment_id, line_no, ipn, qty, sales_order_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(shipment.id.to_string())
        .bind(idx as i64 + 1)
        .bind(line.ipn.as_str())
        .bind(line.qty)
        .bind(line.sales_order_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("insert_shipment_line", e))?;
    }
    Ok(())
}

async fn insert_invoice(conn: &mut SqliteConnection, invoice: &Invoice) -> ServiceResult<()> {
    sqlx::query(
        r#"
        INSERT INTO invoices (id, sales_order_id, total, tax, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(invoice.id.to_string())
    .bind(invoice.sales_order_id.to_string())
    .bind(invoice.total)
    .bind(invoice.tax)
    .bind(invoice.status.as_str())
    .bind(invoice.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_invoice", e))?;
    Ok(())
}

fn decode_invoice(row: &SqliteRow) -> ServiceResult<Invoice> {
    Ok(Invoice {
        id: parsed(row, "id")?,
        sales_order_id: parsed(row, "sales_order_id")?,
        total: column(row, "total")?,
        tax: column(row, "tax")?,
        status: parsed::<InvoiceStatus>(row, "status")?,
        created_at: column(row, "created_at")?,
    })
}

fn parse_shipment_status(raw: &str) -> ServiceResult<ShipmentStatus> {
    match raw {
        "shipped" => Ok(ShipmentStatus::Shipped),
        other => Err(ServiceError::storage(
            "decode_shipment",
            format!("corrupt row: unknown shipment status '{other}'"),
        )),
    }
}
