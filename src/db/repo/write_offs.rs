//! Write-off operations for the repository.

use crate::domain::{ConsumerRef, Money, ProductId, TimeMs, WriteOff};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use super::{get_uuid, Repository};

fn write_off_from_row(row: &SqliteRow) -> Result<WriteOff, sqlx::Error> {
    Ok(WriteOff {
        id: get_uuid(row, "id")?,
        product_id: ProductId::new(row.try_get("product_id")?),
        qty: row.try_get("qty")?,
        total_cost: Money::new(row.try_get("total_cost")?),
        reason: row.try_get("reason")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
        allocations: Vec::new(),
    })
}

impl Repository {
    /// Insert a write-off header. Its allocations may already be in the
    /// transaction; the foreign key is checked at commit.
    pub async fn insert_write_off(
        &self,
        conn: &mut SqliteConnection,
        write_off: &WriteOff,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO write_offs (id, product_id, qty, total_cost, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(write_off.id.to_string())
        .bind(write_off.product_id.as_i64())
        .bind(write_off.qty)
        .bind(write_off.total_cost.minor_units())
        .bind(write_off.reason.as_deref())
        .bind(write_off.created_at.as_i64())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Load a write-off together with its lot allocations.
    pub async fn get_write_off(&self, id: Uuid) -> Result<Option<WriteOff>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, product_id, qty, total_cost, reason, created_at FROM write_offs WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut write_off = write_off_from_row(&row)?;
        write_off.allocations = self.list_allocations(ConsumerRef::WriteOff(id)).await?;
        Ok(Some(write_off))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{product, setup_test_db};
    use crate::domain::{Money, ProductId, TimeMs, WriteOff};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_write_off_roundtrip_without_allocations() {
        let (repo, _temp) = setup_test_db().await;
        repo.upsert_product(&product(1, 100)).await.unwrap();

        let write_off = WriteOff {
            id: Uuid::new_v4(),
            product_id: ProductId::new(1),
            qty: 2,
            total_cost: Money::new(0),
            reason: Some("damaged".to_string()),
            created_at: TimeMs::new(5000),
            allocations: Vec::new(),
        };

        let mut tx = repo.begin().await.unwrap();
        repo.insert_write_off(&mut tx, &write_off).await.unwrap();
        tx.commit().await.unwrap();

        let loaded = repo.get_write_off(write_off.id).await.unwrap();
        assert_eq!(loaded, Some(write_off));
        assert!(repo.get_write_off(Uuid::new_v4()).await.unwrap().is_none());
    }
}
