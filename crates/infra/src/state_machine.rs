//! Order status transitions.
//!
//! Every stage service moves an order through here:
//!
//! 1. [`Transition::prepare`] loads the order and checks the edge against the
//!    transition table, so illegal requests fail with a named error before
//!    any transaction opens.
//! 2. [`Transition::claim`] is the first write of the stage's transaction:
//!    `UPDATE ... SET status = to WHERE id = ? AND status = from`. Zero rows
//!    means a concurrent request won and the stage aborts.
//! 3. The stage applies its side effects, calls [`Transition::audit`] and
//!    commits; [`announce`] then publishes the change.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use solderp_core::SalesOrderId;
use solderp_events::Notification;
use solderp_sales::{OrderStatus, SalesOrder};

use crate::audit::{self, AuditRecord, MODULE_SALES};
use crate::error::{ConflictKind, ServiceError, ServiceResult, map_sqlx_error};
use crate::notify::SharedNotifier;
use crate::orders;

/// A validated status change that has not been applied yet.
#[derive(Debug, Clone)]
pub(crate) struct Transition {
    order: SalesOrder,
    to: OrderStatus,
    at: DateTime<Utc>,
}

impl Transition {
    pub(crate) async fn prepare(
        pool: &SqlitePool,
        id: SalesOrderId,
        to: OrderStatus,
    ) -> ServiceResult<Self> {
        let order = {
            let mut conn = pool
                .acquire()
                .await
                .map_err(|e| map_sqlx_error("acquire", e))?;
            orders::load(&mut conn, id)
                .await?
                .ok_or_else(|| ServiceError::not_found(format!("sales order {id} not found")))?
        };

        if let Err(err) = order.check_transition(to) {
            tracing::info!(order_id = %id, from = %order.status, to = %to, error = %err, "transition refused");
            return Err(err.into());
        }

        Ok(Self {
            order,
            to,
            at: Utc::now(),
        })
    }

    /// The order as it was before this transition.
    pub(crate) fn order(&self) -> &SalesOrder {
        &self.order
    }

    pub(crate) fn from(&self) -> OrderStatus {
        self.order.status
    }

    pub(crate) fn to(&self) -> OrderStatus {
        self.to
    }

    pub(crate) fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// Compare-and-swap the stored status.
    pub(crate) async fn claim(&self, conn: &mut SqliteConnection) -> ServiceResult<()> {
        compare_and_swap(conn, self.order.id, self.from(), self.to, self.at).await
    }

    pub(crate) async fn audit(
        &self,
        conn: &mut SqliteConnection,
        actor: &str,
        detail: Option<&str>,
    ) -> ServiceResult<()> {
        let mut summary = format!("{} -> {}", self.from(), self.to);
        if let Some(detail) = detail {
            summary.push_str("; ");
            summary.push_str(detail);
        }
        audit::record(
            conn,
            AuditRecord {
                actor,
                action: self.to.as_str(),
                module: MODULE_SALES,
                record_id: &self.order.id.to_string(),
                summary: &summary,
            },
            self.at,
        )
        .await
    }
}

/// Publish the committed transition.
pub(crate) fn announce(transition: &Transition, notifier: &SharedNotifier) {
    tracing::info!(
        order_id = %transition.order.id,
        from = %transition.from(),
        to = %transition.to,
        "sales order transitioned"
    );
    notifier.notify(Notification::OrderTransitioned {
        order_id: transition.order.id,
        from: transition.from().as_str().to_string(),
        to: transition.to.as_str().to_string(),
        occurred_at: transition.at,
    });
}

pub(crate) async fn compare_and_swap(
    conn: &mut SqliteConnection,
    id: SalesOrderId,
    from: OrderStatus,
    to: OrderStatus,
    at: DateTime<Utc>,
) -> ServiceResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE sales_orders
        SET status = ?1, updated_at = ?2
        WHERE id = ?3 AND status = ?4
        "#,
    )
    .bind(to.as_str())
    .bind(at)
    .bind(id.to_string())
    .bind(from.as_str())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("transition_sales_order", e))?;

    if result.rows_affected() == 0 {
        tracing::warn!(order_id = %id, %from, %to, "lost transition race");
        return Err(ServiceError::conflict(
            ConflictKind::ConcurrentTransition,
            format!("sales order {id} is no longer {from}; {from} -> {to} was not applied"),
        ));
    }
    Ok(())
}
