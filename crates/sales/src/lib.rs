//! Sales order domain module.
//!
//! This crate contains the order lifecycle rules (status enum and transition
//! table), order/line shapes, and shipment construction. Pure domain logic:
//! no IO, no HTTP, no storage.

pub mod order;
pub mod shipment;
pub mod status;

pub use order::{NewOrderLine, NewSalesOrder, SalesOrder, SalesOrderLine};
pub use shipment::{Shipment, ShipmentLine, ShipmentStatus};
pub use status::{OrderStatus, TRANSITIONS};
