//! Allocation: `confirmed -> allocated`, reserving stock for every line.
//!
//! All lines are reserved in one database transaction. One line short of
//! stock rolls back every reservation and the status change together.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

use solderp_core::SalesOrderId;
use solderp_inventory::{LedgerDelta, so_reference};
use solderp_sales::{OrderStatus, SalesOrder};

use crate::error::{ServiceResult, map_sqlx_error};
use crate::ledger;
use crate::notify::SharedNotifier;
use crate::orders::{self, LineProgress, OrderService};
use crate::state_machine::{self, Transition};

#[derive(Clone)]
pub struct AllocationEngine {
    pool: SqlitePool,
    notifier: SharedNotifier,
    orders: OrderService,
}

impl AllocationEngine {
    pub fn new(pool: SqlitePool, notifier: SharedNotifier) -> Self {
        let orders = OrderService::new(pool.clone(), notifier.clone());
        Self {
            pool,
            notifier,
            orders,
        }
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn allocate(&self, id: SalesOrderId, actor: &str) -> ServiceResult<SalesOrder> {
        let transition = Transition::prepare(&self.pool, id, OrderStatus::Allocated).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        transition.claim(&mut tx).await?;
        if let Err(err) = reserve_lines(&mut tx, transition.order(), transition.at()).await {
            tracing::warn!(order_id = %id, error = %err, "allocation rolled back");
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(err);
        }
        let detail = format!("reserved {} line(s)", transition.order().lines.len());
        transition.audit(&mut tx, actor, Some(&detail)).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        state_machine::announce(&transition, &self.notifier);
        self.orders.get(id).await
    }
}

async fn reserve_lines(
    conn: &mut SqliteConnection,
    order: &SalesOrder,
    at: DateTime<Utc>,
) -> ServiceResult<()> {
    let reference = so_reference(order.id);
    for line in &order.lines {
        let delta = LedgerDelta::reserve(line.ipn.clone(), line.qty, reference.as_str())?;
        ledger::ensure_exists(conn, &line.ipn, at).await?;
        ledger::reserve(conn, &delta, at).await?;
    }
    orders::complete_lines(conn, order.id, LineProgress::Allocated).await
}
