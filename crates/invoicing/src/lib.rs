//! Invoicing domain module.
//!
//! Invoices are derived from shipped sales orders; their totals are always
//! recomputable from the order lines (no IO).

pub mod invoice;

pub use invoice::{Invoice, InvoiceStatus, TaxRate};
