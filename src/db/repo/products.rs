//! Catalog product operations for the repository.

use crate::domain::{Money, Product, ProductId, TimeMs};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{get_parsed, Repository};

const PRODUCT_COLUMNS: &str = "id, title, price, cost_price, packaging_cost, status";

fn product_from_row(row: &SqliteRow) -> Result<Product, sqlx::Error> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        title: row.try_get("title")?,
        price: Money::new(row.try_get("price")?),
        cost_price: row.try_get::<Option<i64>, _>("cost_price")?.map(Money::new),
        packaging_cost: row
            .try_get::<Option<i64>, _>("packaging_cost")?
            .map(Money::new),
        status: get_parsed(row, "status")?,
    })
}

impl Repository {
    /// Insert or replace the ledger's view of a catalog product.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_product(&self, product: &Product) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO products (id, title, price, cost_price, packaging_cost, status, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                price = excluded.price,
                cost_price = excluded.cost_price,
                packaging_cost = excluded.packaging_cost,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(product.id.as_i64())
        .bind(&product.title)
        .bind(product.price.minor_units())
        .bind(product.cost_price.map(|m| m.minor_units()))
        .bind(product.packaging_cost.map(|m| m.minor_units()))
        .bind(product.status.as_str())
        .bind(TimeMs::now().as_i64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load a product on the pool.
    pub async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, sqlx::Error> {
        let sql = format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(product_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    /// Load a product inside an open transaction.
    pub async fn get_product_in(
        &self,
        conn: &mut SqliteConnection,
        product_id: ProductId,
    ) -> Result<Option<Product>, sqlx::Error> {
        let sql = format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(product_id.as_i64())
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    /// All products ordered by id.
    pub async fn list_products(&self) -> Result<Vec<Product>, sqlx::Error> {
        let sql = format!("SELECT {} FROM products ORDER BY id ASC", PRODUCT_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(product_from_row).collect()
    }
}
