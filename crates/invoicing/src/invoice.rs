use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use solderp_core::{DomainError, DomainResult, Entity, InvoiceId, SalesOrderId};
use solderp_sales::{OrderStatus, SalesOrder};

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Open,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Open => "open",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(InvoiceStatus::Open),
            other => Err(DomainError::validation(format!("unknown invoice status '{other}'"))),
        }
    }
}

/// Tax rate in basis points (1 bp = 0.01%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Highest accepted rate: 100%.
    pub const MAX_BPS: u32 = 10_000;

    pub fn from_bps(bps: u32) -> DomainResult<Self> {
        if bps > Self::MAX_BPS {
            return Err(DomainError::validation(format!(
                "tax rate {bps} bps exceeds {} bps",
                Self::MAX_BPS
            )));
        }
        Ok(Self(bps))
    }

    pub fn bps(self) -> u32 {
        self.0
    }

    /// Tax on `total` cents, rounded half-up to whole cents.
    pub fn tax_on(self, total: i64) -> i64 {
        let scaled = i128::from(total) * i128::from(self.0);
        ((scaled + 5_000) / 10_000) as i64
    }
}

/// Invoice for one shipped sales order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub sales_order_id: SalesOrderId,
    /// Σ(qty × unit_price) over the order lines, in cents, before tax.
    pub total: i64,
    pub tax: i64,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Build the invoice for an order that has shipped.
    pub fn for_order(
        order: &SalesOrder,
        rate: TaxRate,
        id: InvoiceId,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if order.status != OrderStatus::Shipped {
            return Err(DomainError::InvalidTransition {
                from: order.status.as_str().to_string(),
                to: OrderStatus::Invoiced.as_str().to_string(),
                required: OrderStatus::Shipped.as_str().to_string(),
            });
        }
        let total = order.total();
        Ok(Self {
            id,
            sales_order_id: order.id,
            total,
            tax: rate.tax_on(total),
            status: InvoiceStatus::Open,
            created_at: at,
        })
    }

    /// Recompute the derived amounts from the order lines.
    ///
    /// Returns `true` when the stored figures were stale.
    pub fn recompute(&mut self, order: &SalesOrder, rate: TaxRate) -> DomainResult<bool> {
        if order.id != self.sales_order_id {
            return Err(DomainError::invariant(format!(
                "invoice {} belongs to order {}, not {}",
                self.id, self.sales_order_id, order.id
            )));
        }
        let total = order.total();
        let tax = rate.tax_on(total);
        let changed = total != self.total || tax != self.tax;
        self.total = total;
        self.tax = tax;
        Ok(changed)
    }

    pub fn grand_total(&self) -> i64 {
        self.total + self.tax
    }
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use solderp_core::Ipn;
    use solderp_sales::{NewOrderLine, NewSalesOrder};

    fn shipped_order(lines: &[(i64, i64)]) -> SalesOrder {
        let mut order = NewSalesOrder {
            customer: "Acme".into(),
            quote_ref: None,
            lines: lines
                .iter()
                .enumerate()
                .map(|(i, (qty, price))| NewOrderLine {
                    ipn: Ipn::parse(format!("P-{i}")).unwrap(),
                    qty: *qty,
                    unit_price: *price,
                })
                .collect(),
        }
        .into_order(SalesOrderId::new(), Utc::now())
        .unwrap();
        order.status = OrderStatus::Shipped;
        order
    }

    #[test]
    fn total_is_qty_times_unit_price() {
        let order = shipped_order(&[(10, 250)]);
        let inv = Invoice::for_order(&order, TaxRate::default(), InvoiceId::new(), Utc::now()).unwrap();
        assert_eq!(inv.total, 2_500);
        assert_eq!(inv.tax, 0);
        assert_eq!(inv.status, InvoiceStatus::Open);
    }

    #[test]
    fn tax_rounds_half_up() {
        let rate = TaxRate::from_bps(825).unwrap();
        // 8.25% of 1.99 = 0.164175 -> 16 cents
        assert_eq!(rate.tax_on(199), 16);
        // 8.25% of 2.00 = 0.165 -> 17 cents
        assert_eq!(rate.tax_on(200), 17);
    }

    #[test]
    fn rejects_rates_above_one_hundred_percent() {
        assert!(TaxRate::from_bps(10_001).is_err());
    }

    #[test]
    fn only_shipped_orders_are_invoiced() {
        let mut order = shipped_order(&[(1, 1)]);
        order.status = OrderStatus::Picked;
        let err = Invoice::for_order(&order, TaxRate::default(), InvoiceId::new(), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("requires status=shipped"));
    }

    #[test]
    fn recompute_detects_stale_totals() {
        let order = shipped_order(&[(3, 100)]);
        let mut inv = Invoice::for_order(&order, TaxRate::default(), InvoiceId::new(), Utc::now()).unwrap();
        assert!(!inv.recompute(&order, TaxRate::default()).unwrap());

        inv.total = 1;
        assert!(inv.recompute(&order, TaxRate::default()).unwrap());
        assert_eq!(inv.total, 300);
    }

    proptest! {
        #[test]
        fn invoice_total_matches_line_sum(
            lines in proptest::collection::vec((1i64..10_000, 0i64..100_000), 1..10),
            bps in 0u32..=10_000,
        ) {
            let order = shipped_order(&lines);
            let rate = TaxRate::from_bps(bps).unwrap();
            let inv = Invoice::for_order(&order, rate, InvoiceId::new(), Utc::now()).unwrap();
            let expected: i64 = lines.iter().map(|(q, p)| q * p).sum();
            prop_assert_eq!(inv.total, expected);
            prop_assert!(inv.tax >= 0 && inv.tax <= inv.total);
        }
    }
}
