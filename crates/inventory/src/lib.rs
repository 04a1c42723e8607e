//! Inventory ledger domain module.
//!
//! Pure rules for the on-hand/reserved ledger: record shape, transaction
//! types, and validation of deltas before they reach storage (no IO).

pub mod delta;
pub mod record;
pub mod transaction;

pub use delta::{LedgerDelta, po_reference, so_reference};
pub use record::InventoryRecord;
pub use transaction::{InventoryTransaction, TransactionType};
