//! Notifications published by the inventory consistency core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use solderp_core::{InspectionId, Ipn, NcrId, SalesOrderId};

use crate::event::Event;

/// Something downstream consumers (dashboards, mailers, buyers) may care about.
///
/// Statuses travel as their wire names so this crate stays independent of the
/// order domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    OrderTransitioned {
        order_id: SalesOrderId,
        from: String,
        to: String,
        occurred_at: DateTime<Utc>,
    },
    InspectionDisposed {
        inspection_id: InspectionId,
        ipn: Ipn,
        qty_passed: i64,
        qty_failed: i64,
        qty_on_hold: i64,
        ncr_id: Option<NcrId>,
        occurred_at: DateTime<Utc>,
    },
    LowStock {
        ipn: Ipn,
        qty_on_hand: i64,
        reorder_point: i64,
        reorder_qty: i64,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for Notification {
    fn event_type(&self) -> &'static str {
        match self {
            Notification::OrderTransitioned { .. } => "sales.order.transitioned",
            Notification::InspectionDisposed { .. } => "receiving.inspection.disposed",
            Notification::LowStock { .. } => "inventory.low_stock",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Notification::OrderTransitioned { occurred_at, .. }
            | Notification::InspectionDisposed { occurred_at, .. }
            | Notification::LowStock { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EventEnvelope;

    #[test]
    fn envelope_copies_event_metadata() {
        let at = Utc::now();
        let n = Notification::LowStock {
            ipn: Ipn::parse("IC-LM317").unwrap(),
            qty_on_hand: 3,
            reorder_point: 5,
            reorder_qty: 100,
            occurred_at: at,
        };
        let env = EventEnvelope::wrap(n.clone());
        assert_eq!(env.event_type(), "inventory.low_stock");
        assert_eq!(env.event_version(), 1);
        assert_eq!(env.occurred_at(), at);
        assert_eq!(env.payload(), &n);
    }

    #[test]
    fn serializes_with_kind_tag() {
        let n = Notification::OrderTransitioned {
            order_id: SalesOrderId::new(),
            from: "picked".into(),
            to: "shipped".into(),
            occurred_at: Utc::now(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "order_transitioned");
        assert_eq!(json["to"], "shipped");
    }
}
