//! SQLite connection management and schema bootstrap.

use core::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tracing::instrument;

use crate::config::DatabaseConfig;
use crate::error::{ServiceResult, map_sqlx_error};

/// Idempotent schema; every statement is `IF NOT EXISTS`.
pub const SCHEMA: &str = include_str!("schema.sql");

/// Open a pool for `config` and make sure the schema exists.
#[instrument(skip(config), fields(url = %config.url, max_connections = config.max_connections), err)]
pub async fn connect(config: &DatabaseConfig) -> ServiceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| map_sqlx_error("parse_database_url", e))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    migrate(&pool).await?;
    tracing::info!("database ready");
    Ok(pool)
}

/// Private in-memory database for tests and demos.
///
/// The pool holds exactly one connection that never expires: an in-memory
/// SQLite database lives only as long as its connection.
pub async fn connect_in_memory() -> ServiceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| map_sqlx_error("parse_database_url", e))?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Apply the schema.
pub async fn migrate(pool: &SqlitePool) -> ServiceResult<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("migrate", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let pool = connect_in_memory().await.unwrap();
        migrate(&pool).await.unwrap();

        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        let n: i64 = row.try_get("n").unwrap();
        assert_eq!(n, 10);
    }

    #[tokio::test]
    async fn negative_stock_is_rejected_by_the_schema() {
        let pool = connect_in_memory().await.unwrap();
        let err = sqlx::query(
            "INSERT INTO inventory (ipn, qty_on_hand, qty_reserved, updated_at) VALUES ('R-1', -1, 0, 'now')",
        )
        .execute(&pool)
        .await
        .unwrap_err();
        assert!(map_sqlx_error("insert", err).is_constraint_violation());
    }

    #[tokio::test]
    async fn transaction_log_is_append_only() {
        let pool = connect_in_memory().await.unwrap();
        sqlx::query("INSERT INTO inventory (ipn, updated_at) VALUES ('R-1', 'now')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO inventory_transactions (ipn, txn_type, quantity, on_hand_delta, reserved_delta, created_at) \
             VALUES ('R-1', 'receive', 5, 5, 0, 'now')",
        )
        .execute(&pool)
        .await
        .unwrap();

        assert!(sqlx::query("UPDATE inventory_transactions SET quantity = 6").execute(&pool).await.is_err());
        assert!(sqlx::query("DELETE FROM inventory_transactions").execute(&pool).await.is_err());
    }

    #[tokio::test]
    async fn file_database_is_created_on_connect() {
        let dir = std::env::temp_dir().join(format!("solderp-db-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("connect.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections: 2,
            ..DatabaseConfig::default()
        };
        let pool = connect(&config).await.unwrap();
        pool.close().await;
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
