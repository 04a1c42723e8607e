//! Wiring: one handle per component, sharing a pool and a notifier.

use sqlx::SqlitePool;

use solderp_invoicing::TaxRate;

use crate::allocation::AllocationEngine;
use crate::config::Config;
use crate::db;
use crate::error::ServiceResult;
use crate::fulfillment::FulfillmentPipeline;
use crate::ledger::Ledger;
use crate::notify::SharedNotifier;
use crate::orders::OrderService;
use crate::receiving::ReceivingEngine;

#[derive(Clone)]
pub struct Services {
    pub ledger: Ledger,
    pub orders: OrderService,
    pub allocation: AllocationEngine,
    pub fulfillment: FulfillmentPipeline,
    pub receiving: ReceivingEngine,
    pool: SqlitePool,
}

impl Services {
    pub fn new(pool: SqlitePool, notifier: SharedNotifier, tax: TaxRate) -> Self {
        Self {
            ledger: Ledger::new(pool.clone(), notifier.clone()),
            orders: OrderService::new(pool.clone(), notifier.clone()),
            allocation: AllocationEngine::new(pool.clone(), notifier.clone()),
            fulfillment: FulfillmentPipeline::new(pool.clone(), notifier.clone(), tax),
            receiving: ReceivingEngine::new(pool.clone(), notifier),
            pool,
        }
    }

    /// Connect to the configured database and build every component.
    pub async fn from_config(config: &Config, notifier: SharedNotifier) -> ServiceResult<Self> {
        let pool = db::connect(&config.database).await?;
        Ok(Self::new(pool, notifier, config.invoice_tax))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
