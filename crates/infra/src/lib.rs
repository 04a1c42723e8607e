//! Infrastructure layer: SQLite storage and the transactional services of
//! the inventory consistency core.
//!
//! Every mutating operation runs in one database transaction and publishes
//! its notification only after commit. Concurrency control lives in SQL
//! (compare-and-swap status updates, conditional reservations, CHECK
//! constraints), never in process-local locks.

pub mod allocation;
pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod fulfillment;
pub mod ledger;
pub mod ncr;
pub mod notify;
pub mod orders;
pub mod receiving;
pub mod services;
pub(crate) mod rows;
pub(crate) mod state_machine;


pub use allocation::AllocationEngine;
pub use config::{Config, ConfigError, DatabaseConfig};
pub use error::{ConflictKind, ServiceError, ServiceResult};
pub use fulfillment::FulfillmentPipeline;
pub use ledger::Ledger;
pub use notify::{Notifier, SharedNotifier};
pub use orders::OrderService;
pub use receiving::{DispositionOutcome, ReceivingEngine};
pub use services::Services;
pub use sqlx::SqlitePool;
