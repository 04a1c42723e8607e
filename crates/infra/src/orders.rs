//! Sales order storage and the draft/confirm end of the lifecycle.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

use solderp_core::SalesOrderId;
use solderp_sales::{NewSalesOrder, OrderStatus, SalesOrder, SalesOrderLine};

use crate::audit::{self, AuditRecord, MODULE_SALES};
use crate::error::{ServiceError, ServiceResult, map_sqlx_error};
use crate::ledger;
use crate::notify::SharedNotifier;
use crate::rows::{column, parsed};
use crate::state_machine::{self, Transition};

/// Per-line quantity column filled in as an order advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineProgress {
    Allocated,
    Picked,
    Shipped,
}

impl LineProgress {
    fn column(self) -> &'static str {
        match self {
            LineProgress::Allocated => "qty_allocated",
            LineProgress::Picked => "qty_picked",
            LineProgress::Shipped => "qty_shipped",
        }
    }
}

pub(crate) async fn load(
    conn: &mut SqliteConnection,
    id: SalesOrderId,
) -> ServiceResult<Option<SalesOrder>> {
    let row = sqlx::query(
        r#"
        SELECT id, customer, status, quote_ref, created_at, updated_at
        FROM sales_orders
        WHERE id = ?1
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_sales_order", e))?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut order = decode_header(&row)?;
    order.lines = load_lines(conn, id).await?;
    Ok(Some(order))
}

async fn load_lines(
    conn: &mut SqliteConnection,
    id: SalesOrderId,
) -> ServiceResult<Vec<SalesOrderLine>> {
    let rows = sqlx::query(
        r#"
        SELECT line_no, ipn, qty, qty_allocated, qty_picked, qty_shipped, unit_price
        FROM sales_order_lines
        WHERE order_id = ?1
        ORDER BY line_no ASC
        "#,
    )
    .bind(id.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("load_sales_order_lines", e))?;

    rows.iter()
        .map(|row| {
            Ok(SalesOrderLine {
                line_no: column(row, "line_no")?,
                ipn: parsed(row, "ipn")?,
                qty: column(row, "qty")?,
                qty_allocated: column(row, "qty_allocated")?,
                qty_picked: column(row, "qty_picked")?,
                qty_shipped: column(row, "qty_shipped")?,
                unit_price: column(row, "unit_price")?,
            })
        })
        .collect()
}

fn decode_header(row: &SqliteRow) -> ServiceResult<SalesOrder> {
    Ok(SalesOrder {
        id: parsed(row, "id")?,
        customer: column(row, "customer")?,
        status: parsed::<OrderStatus>(row, "status")?,
        quote_ref: column(row, "quote_ref")?,
        lines: Vec::new(),
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

async fn insert(conn: &mut SqliteConnection, order: &SalesOrder) -> ServiceResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales_orders (id, customer, status, quote_ref, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(order.id.to_string())
    .bind(&order.customer)
    .bind(order.status.as_str())
    .bind(order.quote_ref.as_deref())
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("insert_sales_order", e))?;

    for line in &order.lines {
        sqlx::query(
            r#"
            INSERT INTO sales_order_lines
                (order_id, line_no, ipn, qty, qty_allocated, qty_picked, qty_shipped, unit_price)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(order.id.to_string())
        .bind(line.line_no)
        .bind(line.ipn.as_str())
        .bind(line.qty)
        .bind(line.qty_allocated)
        .bind(line.qty_picked)
        .bind(line.qty_shipped)
        .bind(line.unit_price)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("insert_sales_order_line", e))?;
    }
    Ok(())
}

/// Mark every line of `id` as fully allocated, picked or shipped.
pub(crate) async fn complete_lines(
    conn: &mut SqliteConnection,
    id: SalesOrderId,
    progress: LineProgress,
) -> ServiceResult<()> {
    let column = progress.column();
    sqlx::query(&format!(
        "UPDATE sales_order_lines SET {column} = qty WHERE order_id = ?1"
    ))
    .bind(id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("complete_sales_order_lines", e))?;
    Ok(())
}

/// Order lookup plus the `draft -> confirmed` step.
#[derive(Clone)]
pub struct OrderService {
    pool: SqlitePool,
    notifier: SharedNotifier,
}

impl OrderService {
    pub fn new(pool: SqlitePool, notifier: SharedNotifier) -> Self {
        Self { pool, notifier }
    }

    /// Open a new order in `draft`. Inventory records for its parts are
    /// created if this is their first reference.
    #[instrument(skip(self, request), fields(customer = %request.customer, lines = request.lines.len()), err)]
    pub async fn create(&self, request: NewSalesOrder, actor: &str) -> ServiceResult<SalesOrder> {
        let now = Utc::now();
        let order = request.into_order(SalesOrderId::new(), now)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        for line in &order.lines {
            ledger::ensure_exists(&mut tx, &line.ipn, now).await?;
        }
        insert(&mut tx, &order).await?;
        audit::record(
            &mut tx,
            AuditRecord {
                actor,
                action: "create",
                module: MODULE_SALES,
                record_id: &order.id.to_string(),
                summary: &format!(
                    "customer={} lines={} total={}",
                    order.customer,
                    order.lines.len(),
                    order.total()
                ),
            },
            now,
        )
        .await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        tracing::info!(order_id = %order.id, "sales order created");
        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn get(&self, id: SalesOrderId) -> ServiceResult<SalesOrder> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        load(&mut conn, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("sales order {id} not found")))
    }

    /// Most recent orders first, optionally restricted to one status.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
    ) -> ServiceResult<Vec<SalesOrder>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        let rows = sqlx::query(
            r#"
            SELECT id, customer, status, quote_ref, created_at, updated_at
            FROM sales_orders
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(status.map(OrderStatus::as_str))
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("list_sales_orders", e))?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut order = decode_header(row)?;
            order.lines = load_lines(&mut conn, order.id).await?;
            orders.push(order);
        }
        Ok(orders)
    }

    /// `draft -> confirmed`. Requires at least one line.
    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn confirm(&self, id: SalesOrderId, actor: &str) -> ServiceResult<SalesOrder> {
        let transition = Transition::prepare(&self.pool, id, OrderStatus::Confirmed).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        transition.claim(&mut tx).await?;
        transition.audit(&mut tx, actor, None).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        state_machine::announce(&transition, &self.notifier);
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::error::ConflictKind;
    use crate::notify;
    use solderp_core::Ipn;
    use solderp_sales::NewOrderLine;

    async fn service() -> OrderService {
        let pool = db::connect_in_memory().await.unwrap();
        let (notifier, _bus) = notify::in_memory();
        OrderService::new(pool, notifier)
    }

    fn request() -> NewSalesOrder {
        NewSalesOrder {
            customer: "Acme Robotics".into(),
            quote_ref: Some("Q-1001".into()),
            lines: vec![
                NewOrderLine {
                    ipn: Ipn::parse("IC-STM32F4").unwrap(),
                    qty: 10,
                    unit_price: 450,
                },
                NewOrderLine {
                    ipn: Ipn::parse("CAP-0402-1U").unwrap(),
                    qty: 200,
                    unit_price: 2,
                },
            ],
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips_lines() {
        let svc = service().await;
        let created = svc.create(request(), "alice").await.unwrap();
        let loaded = svc.get(created.id).await.unwrap();
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.customer, "Acme Robotics");
        assert_eq!(loaded.quote_ref.as_deref(), Some("Q-1001"));
        assert_eq!(loaded.lines, created.lines);
        assert_eq!(loaded.status, OrderStatus::Draft);
        assert_eq!(loaded.total(), 10 * 450 + 200 * 2);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let svc = service().await;
        let err = svc.get(SalesOrderId::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let err = svc.confirm(SalesOrderId::new(), "alice").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn confirm_twice_is_an_invalid_transition() {
        let svc = service().await;
        let order = svc.create(request(), "alice").await.unwrap();
        let confirmed = svc.confirm(order.id, "alice").await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);

        let err = svc.confirm(order.id, "alice").await.unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::InvalidTransition));
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let svc = service().await;
        let a = svc.create(request(), "alice").await.unwrap();
        svc.create(request(), "alice").await.unwrap();
        svc.confirm(a.id, "alice").await.unwrap();

        assert_eq!(svc.list(None, 50).await.unwrap().len(), 2);
        let confirmed = svc.list(Some(OrderStatus::Confirmed), 50).await.unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, a.id);
        assert_eq!(confirmed[0].lines.len(), 2);
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_storage() {
        let svc = service().await;
        let mut bad = request();
        bad.lines[0].qty = 0;
        let err = svc.create(bad, "alice").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(svc.list(None, 10).await.unwrap().is_empty());
    }
}
