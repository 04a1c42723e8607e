//! Receiving inspection domain module.
//!
//! Goods receipt creates a pending inspection; an inspector disposes it
//! exactly once into passed / failed / on-hold quantities. Failed quantities
//! raise a non-conformance record. Pure domain logic (no IO).

pub mod inspection;
pub mod ncr;

pub use inspection::{Disposition, NewReceipt, ReceivingInspection};
pub use ncr::{NcrRequest, NonConformanceRecord};
