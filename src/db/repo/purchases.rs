//! Supplier purchase operations for the repository.

use crate::domain::{Money, TimeMs};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use uuid::Uuid;

use super::Repository;

impl Repository {
    /// Insert a purchase header. Lots reference it by `purchase_id`.
    pub async fn insert_purchase(
        &self,
        conn: &mut SqliteConnection,
        id: Uuid,
        supplier: Option<&str>,
        freight_cost: Money,
        received_at: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO purchases (id, supplier, freight_cost, received_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(supplier)
        .bind(freight_cost.minor_units())
        .bind(received_at.as_i64())
        .bind(TimeMs::now().as_i64())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Number of recorded purchases.
    pub async fn count_purchases(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM purchases")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("n")
    }
}
