//! Ledger delta validation.
//!
//! A delta is checked here before it is turned into an increment-in-place
//! statement. Storage CHECK constraints remain as a last resort; callers are
//! expected to reject bad deltas before opening a transaction.

use serde::{Deserialize, Serialize};

use solderp_core::{DomainError, DomainResult, Ipn, SalesOrderId};

use crate::record::InventoryRecord;
use crate::transaction::TransactionType;

/// Reference string attached to ledger rows caused by a sales order.
pub fn so_reference(order_id: SalesOrderId) -> String {
    format!("SO:{order_id}")
}

/// Reference string attached to ledger rows caused by a purchase order.
pub fn po_reference(po_id: &str) -> String {
    format!("PO:{po_id}")
}

/// One atomic change to a part's on-hand and reserved quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDelta {
    pub ipn: Ipn,
    pub on_hand_delta: i64,
    pub reserved_delta: i64,
    pub txn_type: TransactionType,
    pub reference: String,
    pub notes: String,
}

impl LedgerDelta {
    /// Build a delta, enforcing that its signs agree with its type:
    ///
    /// - `receive`/`return` add on-hand stock
    /// - `issue`/`scrap` remove on-hand stock
    /// - `adjust` changes on-hand stock in either direction
    /// - `transfer` moves stock between the available and reserved buckets
    pub fn new(
        ipn: Ipn,
        on_hand_delta: i64,
        reserved_delta: i64,
        txn_type: TransactionType,
        reference: impl Into<String>,
        notes: impl Into<String>,
    ) -> DomainResult<Self> {
        if on_hand_delta == 0 && reserved_delta == 0 {
            return Err(DomainError::validation(format!(
                "ledger delta for {ipn} changes nothing"
            )));
        }

        if on_hand_delta == i64::MIN || reserved_delta == i64::MIN {
            return Err(DomainError::validation(format!(
                "ledger delta for {ipn} is out of range"
            )));
        }

        let sign_ok = match txn_type {
            TransactionType::Receive | TransactionType::Return => on_hand_delta > 0,
            TransactionType::Issue | TransactionType::Scrap => on_hand_delta < 0,
            TransactionType::Adjust => on_hand_delta != 0,
            TransactionType::Transfer => on_hand_delta == 0,
        };
        if !sign_ok {
            return Err(DomainError::validation(format!(
                "{txn_type} delta for {ipn} has inconsistent on-hand change {on_hand_delta}"
            )));
        }

        Ok(Self {
            ipn,
            on_hand_delta,
            reserved_delta,
            txn_type,
            reference: reference.into(),
            notes: notes.into(),
        })
    }

    /// Reserve `qty` units for an order (available -> reserved).
    pub fn reserve(ipn: Ipn, qty: i64, reference: impl Into<String>) -> DomainResult<Self> {
        ensure_positive(&ipn, qty)?;
        Self::new(ipn, 0, qty, TransactionType::Transfer, reference, "reserve")
    }

    /// Ship `qty` reserved units: consume stock and release the reservation together.
    pub fn ship(ipn: Ipn, qty: i64, reference: impl Into<String>) -> DomainResult<Self> {
        ensure_positive(&ipn, qty)?;
        Self::new(ipn, -qty, -qty, TransactionType::Issue, reference, "ship")
    }

    /// Credit `qty` units that passed receiving inspection.
    pub fn receive(
        ipn: Ipn,
        qty: i64,
        reference: impl Into<String>,
        notes: impl Into<String>,
    ) -> DomainResult<Self> {
        ensure_positive(&ipn, qty)?;
        Self::new(ipn, qty, 0, TransactionType::Receive, reference, notes)
    }

    /// Movement magnitude recorded in the transaction log.
    pub fn quantity(&self) -> i64 {
        if self.on_hand_delta != 0 {
            self.on_hand_delta.abs()
        } else {
            self.reserved_delta.abs()
        }
    }

    /// Predict the resulting `(on_hand, reserved)` pair, rejecting anything
    /// that would go negative or reserve more than is on hand.
    pub fn project(&self, record: &InventoryRecord) -> DomainResult<(i64, i64)> {
        let on_hand = record
            .qty_on_hand
            .checked_add(self.on_hand_delta)
            .ok_or_else(|| self.out_of_range(record))?;
        let reserved = record
            .qty_reserved
            .checked_add(self.reserved_delta)
            .ok_or_else(|| self.out_of_range(record))?;

        if on_hand < 0 {
            return Err(DomainError::insufficient(
                self.ipn.as_str(),
                -self.on_hand_delta,
                record.qty_on_hand,
            ));
        }
        if reserved < 0 {
            return Err(DomainError::invariant(format!(
                "reserved quantity for {} would drop to {reserved}",
                self.ipn
            )));
        }
        // Reserving more, or removing stock, must leave every reservation covered.
        if reserved > on_hand && (self.reserved_delta > 0 || self.on_hand_delta < 0) {
            return Err(DomainError::insufficient(
                self.ipn.as_str(),
                self.quantity(),
                record.available(),
            ));
        }
        Ok((on_hand, reserved))
    }

    fn out_of_range(&self, record: &InventoryRecord) -> DomainError {
        DomainError::validation(format!(
            "delta for {} (on_hand {:+}, reserved {:+}) overflows current stock {}/{}",
            self.ipn, self.on_hand_delta, self.reserved_delta, record.qty_on_hand, record.qty_reserved
        ))
    }
}

fn ensure_positive(ipn: &Ipn, qty: i64) -> DomainResult<()> {
    if qty <= 0 {
        return Err(DomainError::validation(format!(
            "quantity for {ipn} must be positive, got {qty}"
        )));
    }
    Ok(())
}
