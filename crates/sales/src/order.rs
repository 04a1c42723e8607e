use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use solderp_core::{DomainError, DomainResult, Entity, Ipn, SalesOrderId};

use crate::status::OrderStatus;

/// Upper bound on a single line quantity; keeps `qty * unit_price` far from overflow.
pub const MAX_LINE_QTY: i64 = 1_000_000_000;

/// Upper bound on a unit price in cents.
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000;

/// Order line: part, quantities through the pipeline, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderLine {
    pub line_no: i64,
    pub ipn: Ipn,
    pub qty: i64,
    pub qty_allocated: i64,
    pub qty_picked: i64,
    pub qty_shipped: i64,
    /// Price in smallest currency unit (cents).
    pub unit_price: i64,
}

impl SalesOrderLine {
    pub fn line_total(&self) -> i64 {
        self.qty * self.unit_price
    }
}

/// Sales order as persisted: header plus ordered lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: SalesOrderId,
    pub customer: String,
    pub status: OrderStatus,
    pub quote_ref: Option<String>,
    pub lines: Vec<SalesOrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SalesOrder {
    /// Sum of `qty * unit_price` over all lines, in cents.
    ///
    /// Fits in an `i64` for every order built through `NewSalesOrder`.
    pub fn total(&self) -> i64 {
        self.lines.iter().map(SalesOrderLine::line_total).sum()
    }

    /// Validate that this order may move to `target` right now.
    ///
    /// Checks the transition table, then stage-specific preconditions.
    pub fn check_transition(&self, target: OrderStatus) -> DomainResult<()> {
        self.status.check_transition(target)?;
        if target == OrderStatus::Confirmed && self.lines.is_empty() {
            return Err(DomainError::validation(format!(
                "sales order {} has no lines to confirm",
                self.id
            )));
        }
        Ok(())
    }
}

impl Entity for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Requested line for a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub ipn: Ipn,
    pub qty: i64,
    pub unit_price: i64,
}

/// Request to open a new order in `draft`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSalesOrder {
    pub customer: String,
    #[serde(default)]
    pub quote_ref: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

impl NewSalesOrder {
    pub fn validate(&self) -> DomainResult<()> {
        if self.customer.trim().is_empty() {
            return Err(DomainError::validation("customer cannot be empty"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("sales order needs at least one line"));
        }
        for (idx, line) in self.lines.iter().enumerate() {
            let line_no = idx + 1;
            if line.qty <= 0 || line.qty > MAX_LINE_QTY {
                return Err(DomainError::validation(format!(
                    "line {line_no} ({}): qty must be in 1..={MAX_LINE_QTY}, got {}",
                    line.ipn, line.qty
                )));
            }
            if line.unit_price < 0 || line.unit_price > MAX_UNIT_PRICE {
                return Err(DomainError::validation(format!(
                    "line {line_no} ({}): unit_price must be in 0..={MAX_UNIT_PRICE}, got {}",
                    line.ipn, line.unit_price
                )));
            }
        }
        let total = self.lines.iter().try_fold(0i64, |acc, line| {
            line.qty
                .checked_mul(line.unit_price)
                .and_then(|line_total| acc.checked_add(line_total))
        });
        if total.is_none() {
            return Err(DomainError::validation(format!(
                "order total over {} line(s) exceeds {} cents",
                self.lines.len(),
                i64::MAX
            )));
        }
        Ok(())
    }

    /// Materialize a validated draft order.
    pub fn into_order(self, id: SalesOrderId, at: DateTime<Utc>) -> DomainResult<SalesOrder> {
        self.validate()?;
        let lines = self
            .lines
            .into_iter()
            .enumerate()
            .map(|(idx, l)| SalesOrderLine {
                line_no: idx as i64 + 1,
                ipn: l.ipn,
                qty: l.qty,
                qty_allocated: 0,
                qty_picked: 0,
                qty_shipped: 0,
                unit_price: l.unit_price,
            })
            .collect();
        Ok(SalesOrder {
            id,
            customer: self.customer.trim().to_string(),
            status: OrderStatus::Draft,
            quote_ref: self.quote_ref,
            lines,
            created_at: at,
            updated_at: at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(ipn: &str, qty: i64, unit_price: i64) -> NewOrderLine {
        NewOrderLine {
            ipn: Ipn::parse(ipn).unwrap(),
            qty,
            unit_price,
        }
    }

    fn new_order(lines: Vec<NewOrderLine>) -> NewSalesOrder {
        NewSalesOrder {
            customer: "Acme Robotics".into(),
            quote_ref: Some("Q-0007".into()),
            lines,
        }
    }

    #[test]
    fn new_order_starts_in_draft_with_numbered_lines() {
        let order = new_order(vec![line("MCU-RP2040", 10, 80), line("CAP-0402-1U", 500, 1)])
            .into_order(SalesOrderId::new(), Utc::now())
            .unwrap();
        assert_eq!(order.status, OrderStatus::Draft);
        assert_eq!(order.lines[0].line_no, 1);
        assert_eq!(order.lines[1].line_no, 2);
        assert_eq!(order.lines[1].qty_allocated, 0);
        assert_eq!(order.quote_ref.as_deref(), Some("Q-0007"));
    }

    #[test]
    fn total_is_sum_of_line_totals() {
        let order = new_order(vec![line("MCU-RP2040", 10, 80), line("CAP-0402-1U", 500, 1)])
            .into_order(SalesOrderId::new(), Utc::now())
            .unwrap();
        assert_eq!(order.total(), 10 * 80 + 500);
    }

    #[test]
    fn order_total_must_fit_in_cents() {
        let max = line("MCU-RP2040", MAX_LINE_QTY, MAX_UNIT_PRICE);
        assert!(new_order(vec![max.clone(); 9]).validate().is_ok());

        let err = new_order(vec![max; 10]).validate().unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("order total"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_customer_and_no_lines() {
        let mut req = new_order(vec![line("MCU-RP2040", 1, 1)]);
        req.customer = "  ".into();
        assert!(matches!(req.validate(), Err(DomainError::Validation(_))));

        assert!(matches!(new_order(vec![]).validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn rejects_non_positive_qty_naming_the_part() {
        let err = new_order(vec![line("MCU-RP2040", 0, 1)]).validate().unwrap_err();
        assert!(err.to_string().contains("MCU-RP2040"));
    }

    #[test]
    fn rejects_negative_price() {
        assert!(new_order(vec![line("MCU-RP2040", 1, -1)]).validate().is_err());
    }

    #[test]
    fn confirm_requires_lines() {
        let mut order = new_order(vec![line("MCU-RP2040", 1, 1)])
            .into_order(SalesOrderId::new(), Utc::now())
            .unwrap();
        order.lines.clear();
        assert!(matches!(
            order.check_transition(OrderStatus::Confirmed),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn check_transition_defers_to_table() {
        let order = new_order(vec![line("MCU-RP2040", 1, 1)])
            .into_order(SalesOrderId::new(), Utc::now())
            .unwrap();
        assert!(order.check_transition(OrderStatus::Confirmed).is_ok());
        assert!(matches!(
            order.check_transition(OrderStatus::Allocated),
            Err(DomainError::InvalidTransition { .. })
        ));
    }
}
