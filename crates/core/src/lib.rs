//! `solderp-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{InspectionId, InvoiceId, NcrId, SalesOrderId, ShipmentId};
pub use value_object::{Ipn, ValueObject};
