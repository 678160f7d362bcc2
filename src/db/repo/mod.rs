//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by table group:
//! - `products.rs` - Catalog products referenced by the ledger
//! - `ledger.rs` - Append-only inventory movements and stock sums
//! - `lots.rs` - Lots, lot locking and lot allocations
//! - `orders.rs` - Orders, order items and channel counters
//! - `write_offs.rs` - Write-offs
//! - `purchases.rs` - Supplier purchases
//! - `analytics.rs` - Read-only aggregation queries
//!
//! Methods that take a `&mut SqliteConnection` run on the caller's open
//! transaction; methods without one run on the pool and see committed state.

mod analytics;
mod ledger;
mod lots;
mod orders;
mod products;
mod purchases;
mod write_offs;

pub use analytics::StockQueryRow;

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;
use uuid::Uuid;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a transaction. Callers that mutate lots must take the lot write
    /// lock (`lock_lots`) as the first statement.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Cheap connectivity check for readiness probes.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// True for SQLite lock conflicts (`SQLITE_BUSY*`, `SQLITE_LOCKED*`), the
/// only storage errors worth retrying a whole transaction for.
pub fn is_lock_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let primary = db_err
                .code()
                .and_then(|c| c.parse::<i32>().ok())
                .map(|c| c & 0xff);
            matches!(primary, Some(5) | Some(6))
                || db_err.message().contains("database is locked")
        }
        _ => false,
    }
}

/// True when the error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

fn decode_error(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into(),
    }
}

/// Read a TEXT column holding a value parsed with `FromStr`.
fn get_parsed<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|e| decode_error(column, format!("{}: {}", raw, e)))
}

fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, sqlx::Error> {
    get_parsed::<Uuid>(row, column)
}

fn get_opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| {
        Uuid::parse_str(&s).map_err(|e| decode_error(column, format!("{}: {}", s, e)))
    })
    .transpose()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Repository;
    use crate::db::migrations::init_db;
    use crate::domain::{Money, Product, ProductId, ProductStatus};
    use tempfile::TempDir;

    pub async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    pub fn product(id: i64, price: i64) -> Product {
        Product {
            id: ProductId::new(id),
            title: format!("Product {}", id),
            price: Money::new(price),
            cost_price: None,
            packaging_cost: None,
            status: ProductStatus::Active,
        }
    }
}
