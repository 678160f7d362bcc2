//! Append-only inventory ledger operations for the repository.
//!
//! There is deliberately no update or delete here. Corrections are new
//! ADJUST movements.

use crate::domain::{InventoryMovement, MovementKind, ProductId, SourceKind, TimeMs};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{get_parsed, Repository};

fn movement_from_row(row: &SqliteRow) -> Result<InventoryMovement, sqlx::Error> {
    Ok(InventoryMovement {
        id: row.try_get("id")?,
        product_id: ProductId::new(row.try_get("product_id")?),
        quantity: row.try_get("quantity")?,
        kind: get_parsed(row, "kind")?,
        source_kind: get_parsed(row, "source_kind")?,
        source_id: row.try_get("source_id")?,
        note: row.try_get("note")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
    })
}

impl Repository {
    /// Append a signed movement to the ledger.
    ///
    /// # Errors
    /// Returns an error if the insert fails (including a zero quantity, which
    /// the schema rejects).
    #[allow(clippy::too_many_arguments)]
    pub async fn append_movement(
        &self,
        conn: &mut SqliteConnection,
        product_id: ProductId,
        quantity: i64,
        kind: MovementKind,
        source_kind: SourceKind,
        source_id: Option<&str>,
        note: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO inventory_movements
            (product_id, quantity, kind, source_kind, source_id, note, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product_id.as_i64())
        .bind(quantity)
        .bind(kind.as_str())
        .bind(source_kind.as_str())
        .bind(source_id)
        .bind(note)
        .bind(TimeMs::now().as_i64())
        .execute(&mut *conn)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Current stock of a product: the sum of all its movements.
    pub async fn current_stock(&self, product_id: ProductId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(quantity), 0) AS stock FROM inventory_movements WHERE product_id = ?",
        )
        .bind(product_id.as_i64())
        .fetch_one(&self.pool)
        .await?;
        row.try_get("stock")
    }

    /// Current stock as seen by an open transaction.
    pub async fn current_stock_in(
        &self,
        conn: &mut SqliteConnection,
        product_id: ProductId,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(quantity), 0) AS stock FROM inventory_movements WHERE product_id = ?",
        )
        .bind(product_id.as_i64())
        .fetch_one(&mut *conn)
        .await?;
        row.try_get("stock")
    }

    /// All movements of a product in insertion order.
    pub async fn list_movements(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<InventoryMovement>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, quantity, kind, source_kind, source_id, note, created_at
            FROM inventory_movements
            WHERE product_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(product_id.as_i64())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(movement_from_row).collect()
    }

    /// Movements recorded for one source document (an order, a write-off, a purchase).
    pub async fn list_movements_for_source(
        &self,
        source_kind: SourceKind,
        source_id: &str,
    ) -> Result<Vec<InventoryMovement>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, quantity, kind, source_kind, source_id, note, created_at
            FROM inventory_movements
            WHERE source_kind = ? AND source_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(source_kind.as_str())
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(movement_from_row).collect()
    }
}
