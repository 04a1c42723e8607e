use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use solderp_core::{Entity, Ipn, SalesOrderId, ShipmentId};

use crate::order::SalesOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentStatus {
    Shipped,
}

impl ShipmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::Shipped => "shipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentLine {
    pub ipn: Ipn,
    pub qty: i64,
    pub sales_order_id: SalesOrderId,
}

/// Outbound shipment, created exactly once when an order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub sales_order_id: SalesOrderId,
    /// Always `outbound` for shipments created by the fulfillment pipeline.
    pub shipment_type: String,
    pub status: ShipmentStatus,
    pub lines: Vec<ShipmentLine>,
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    pub const OUTBOUND: &'static str = "outbound";

    /// One shipment line per order line, shipping the full ordered quantity.
    pub fn outbound_for(order: &SalesOrder, id: ShipmentId, at: DateTime<Utc>) -> Self {
        let lines = order
            .lines
            .iter()
            .map(|l| ShipmentLine {
                ipn: l.ipn.clone(),
                qty: l.qty,
                sales_order_id: order.id,
            })
            .collect();
        Self {
            id,
            sales_order_id: order.id,
            shipment_type: Self::OUTBOUND.to_string(),
            status: ShipmentStatus::Shipped,
            lines,
            created_at: at,
        }
    }

    pub fn total_units(&self) -> i64 {
        self.lines.iter().map(|l| l.qty).sum()
    }
}

impl Entity for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{NewOrderLine, NewSalesOrder};

    #[test]
    fn outbound_shipment_mirrors_order_lines() {
        let order = NewSalesOrder {
            customer: "Acme".into(),
            quote_ref: None,
            lines: vec![
                NewOrderLine { ipn: Ipn::parse("A-1").unwrap(), qty: 4, unit_price: 10 },
                NewOrderLine { ipn: Ipn::parse("B-2").unwrap(), qty: 6, unit_price: 20 },
            ],
        }
        .into_order(SalesOrderId::new(), Utc::now())
        .unwrap();

        let shipment = Shipment::outbound_for(&order, ShipmentId::new(), Utc::now());
        assert_eq!(shipment.shipment_type, "outbound");
        assert_eq!(shipment.lines.len(), 2);
        assert!(shipment.lines.iter().all(|l| l.sales_order_id == order.id));
        assert_eq!(shipment.total_units(), 10);
    }
}
