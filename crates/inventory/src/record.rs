use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use solderp_core::{Entity, Ipn};

/// Stock position of a single part.
///
/// Rows are created lazily (zero-initialized) the first time a part is
/// referenced and are only ever changed through ledger deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub ipn: Ipn,
    pub qty_on_hand: i64,
    pub qty_reserved: i64,
    pub location: Option<String>,
    /// Low-stock trigger; zero disables low-stock notifications.
    pub reorder_point: i64,
    /// Suggested purchase quantity once the reorder point is reached.
    pub reorder_qty: i64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn empty(ipn: Ipn, at: DateTime<Utc>) -> Self {
        Self {
            ipn,
            qty_on_hand: 0,
            qty_reserved: 0,
            location: None,
            reorder_point: 0,
            reorder_qty: 0,
            updated_at: at,
        }
    }

    /// Unreserved stock that a new order may still claim.
    pub fn available(&self) -> i64 {
        self.qty_on_hand - self.qty_reserved
    }

    pub fn can_reserve(&self, qty: i64) -> bool {
        qty <= self.available()
    }

    /// Whether on-hand stock sits at or below a configured reorder point.
    pub fn needs_reorder(&self) -> bool {
        self.reorder_point > 0 && self.qty_on_hand <= self.reorder_point
    }
}

impl Entity for InventoryRecord {
    type Id = Ipn;

    fn id(&self) -> &Self::Id {
        &self.ipn
    }
}
