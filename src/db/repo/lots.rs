//! Lot store and lot allocation operations for the repository.

use crate::domain::{
    ConsumerRef, InventoryLot, LotAllocation, LotId, Money, OrderItemId, ProductId, TimeMs,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use super::{decode_error, get_opt_uuid, Repository};

const LOT_COLUMNS: &str =
    "id, product_id, purchase_id, unit_cost, qty_received, qty_remaining, received_at";

fn lot_from_row(row: &SqliteRow) -> Result<InventoryLot, sqlx::Error> {
    Ok(InventoryLot {
        id: LotId::new(row.try_get("id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        purchase_id: get_opt_uuid(row, "purchase_id")?,
        unit_cost: Money::new(row.try_get("unit_cost")?),
        qty_received: row.try_get("qty_received")?,
        qty_remaining: row.try_get("qty_remaining")?,
        received_at: TimeMs::new(row.try_get("received_at")?),
    })
}

fn allocation_from_row(row: &SqliteRow) -> Result<LotAllocation, sqlx::Error> {
    let order_item_id: Option<i64> = row.try_get("order_item_id")?;
    let write_off_id = get_opt_uuid(row, "write_off_id")?;
    let consumer = match (order_item_id, write_off_id) {
        (Some(id), None) => ConsumerRef::OrderItem(OrderItemId::new(id)),
        (None, Some(id)) => ConsumerRef::WriteOff(id),
        _ => {
            return Err(decode_error(
                "order_item_id",
                "allocation must reference exactly one consumer".to_string(),
            ))
        }
    };
    Ok(LotAllocation {
        lot_id: LotId::new(row.try_get("lot_id")?),
        consumer,
        qty: row.try_get("qty")?,
        unit_cost: Money::new(row.try_get("unit_cost")?),
    })
}

impl Repository {
    /// Create a lot with `qty_remaining = qty`.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_lot(
        &self,
        conn: &mut SqliteConnection,
        product_id: ProductId,
        unit_cost: Money,
        qty: i64,
        received_at: TimeMs,
        purchase_id: Option<Uuid>,
    ) -> Result<InventoryLot, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO inventory_lots
            (product_id, purchase_id, unit_cost, qty_received, qty_remaining, received_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product_id.as_i64())
        .bind(purchase_id.map(|id| id.to_string()))
        .bind(unit_cost.minor_units())
        .bind(qty)
        .bind(qty)
        .bind(received_at.as_i64())
        .bind(TimeMs::now().as_i64())
        .execute(&mut *conn)
        .await?;

        Ok(InventoryLot {
            id: LotId::new(result.last_insert_rowid()),
            product_id,
            purchase_id,
            unit_cost,
            qty_received: qty,
            qty_remaining: qty,
            received_at,
        })
    }

    /// Take the write lock on the lots of `product_ids`.
    ///
    /// This is a no-op UPDATE of exactly the rows that may be consumed. Run as
    /// the first statement of a transaction it makes SQLite acquire its
    /// writer lock before anything is read, waiting out `busy_timeout` if
    /// another writer holds it. Everything read afterwards in the same
    /// transaction is current and cannot change until commit.
    pub async fn lock_lots(
        &self,
        conn: &mut SqliteConnection,
        product_ids: &[ProductId],
    ) -> Result<u64, sqlx::Error> {
        if product_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; product_ids.len()].join(", ");
        let sql = format!(
            "UPDATE inventory_lots SET qty_remaining = qty_remaining \
             WHERE qty_remaining > 0 AND product_id IN ({})",
            placeholders
        );
        let mut query = sqlx::query(&sql);
        for product_id in product_ids {
            query = query.bind(product_id.as_i64());
        }
        let result = query.execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    /// Lots with stock left, oldest first. This ordering is the FIFO contract.
    pub async fn list_consumable_lots(
        &self,
        conn: &mut SqliteConnection,
        product_id: ProductId,
    ) -> Result<Vec<InventoryLot>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM inventory_lots \
             WHERE product_id = ? AND qty_remaining > 0 \
             ORDER BY received_at ASC, id ASC",
            LOT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(product_id.as_i64())
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(lot_from_row).collect()
    }

    /// Decrement a lot's remaining quantity. Returns false if the lot does not
    /// hold `amount`, in which case nothing changed.
    ///
    /// Only the allocation engine calls this.
    pub async fn decrement_lot_remaining(
        &self,
        conn: &mut SqliteConnection,
        lot_id: LotId,
        amount: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_lots
            SET qty_remaining = qty_remaining - ?
            WHERE id = ? AND qty_remaining >= ?
            "#,
        )
        .bind(amount)
        .bind(lot_id.as_i64())
        .bind(amount)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record one lot allocation.
    pub async fn insert_allocation(
        &self,
        conn: &mut SqliteConnection,
        allocation: &LotAllocation,
    ) -> Result<(), sqlx::Error> {
        let (order_item_id, write_off_id) = match allocation.consumer {
            ConsumerRef::OrderItem(id) => (Some(id.as_i64()), None),
            ConsumerRef::WriteOff(id) => (None, Some(id.to_string())),
        };

        sqlx::query(
            r#"
            INSERT INTO lot_allocations
            (lot_id, order_item_id, write_off_id, qty, unit_cost, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(allocation.lot_id.as_i64())
        .bind(order_item_id)
        .bind(write_off_id)
        .bind(allocation.qty)
        .bind(allocation.unit_cost.minor_units())
        .bind(TimeMs::now().as_i64())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Sum of `qty_remaining` over a product's lots, inside a transaction.
    pub async fn lot_stock_in(
        &self,
        conn: &mut SqliteConnection,
        product_id: ProductId,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(qty_remaining), 0) AS stock FROM inventory_lots WHERE product_id = ?",
        )
        .bind(product_id.as_i64())
        .fetch_one(&mut *conn)
        .await?;
        row.try_get("stock")
    }

    /// Sum of `qty_remaining` over a product's lots.
    pub async fn lot_stock(&self, product_id: ProductId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(qty_remaining), 0) AS stock FROM inventory_lots WHERE product_id = ?",
        )
        .bind(product_id.as_i64())
        .fetch_one(&self.pool)
        .await?;
        row.try_get("stock")
    }

    /// Every lot of a product, exhausted ones included, in FIFO order.
    pub async fn list_lots(&self, product_id: ProductId) -> Result<Vec<InventoryLot>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM inventory_lots WHERE product_id = ? ORDER BY received_at ASC, id ASC",
            LOT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(product_id.as_i64())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(lot_from_row).collect()
    }

    /// Allocations charged to one consumer, in the order they were made.
    pub async fn list_allocations(
        &self,
        consumer: ConsumerRef,
    ) -> Result<Vec<LotAllocation>, sqlx::Error> {
        let rows = match consumer {
            ConsumerRef::OrderItem(id) => {
                sqlx::query(
                    r#"
                    SELECT lot_id, order_item_id, write_off_id, qty, unit_cost
                    FROM lot_allocations WHERE order_item_id = ? ORDER BY id ASC
                    "#,
                )
                .bind(id.as_i64())
                .fetch_all(&self.pool)
                .await?
            }
            ConsumerRef::WriteOff(id) => {
                sqlx::query(
                    r#"
                    SELECT lot_id, order_item_id, write_off_id, qty, unit_cost
                    FROM lot_allocations WHERE write_off_id = ? ORDER BY id ASC
                    "#,
                )
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(allocation_from_row).collect()
    }

    /// Total number of allocation rows for a product's lots.
    pub async fn count_allocations(&self, product_id: ProductId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n
            FROM lot_allocations la
            JOIN inventory_lots l ON l.id = la.lot_id
            WHERE l.product_id = ?
            "#,
        )
        .bind(product_id.as_i64())
        .fetch_one(&self.pool)
        .await?;
        row.try_get("n")
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{product, setup_test_db};
    use crate::domain::{Money, ProductId, TimeMs};

    #[tokio::test]
    async fn test_consumable_lots_fifo_order_with_ties() {
        let (repo, _temp) = setup_test_db().await;
        repo.upsert_product(&product(1, 100)).await.unwrap();
        let pid = ProductId::new(1);

        let mut tx = repo.begin().await.unwrap();
        let late = repo
            .insert_lot(&mut tx, pid, Money::new(300), 5, TimeMs::new(3000), None)
            .await
            .unwrap();
        let early_a = repo
            .insert_lot(&mut tx, pid, Money::new(100), 5, TimeMs::new(1000), None)
            .await
            .unwrap();
        let early_b = repo
            .insert_lot(&mut tx, pid, Money::new(200), 5, TimeMs::new(1000), None)
            .await
            .unwrap();

        let lots = repo.list_consumable_lots(&mut tx, pid).await.unwrap();
        let ids: Vec<_> = lots.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![early_a.id, early_b.id, late.id]);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_decrement_refuses_to_go_negative() {
        let (repo, _temp) = setup_test_db().await;
        repo.upsert_product(&product(1, 100)).await.unwrap();
        let pid = ProductId::new(1);

        let mut tx = repo.begin().await.unwrap();
        let lot = repo
            .insert_lot(&mut tx, pid, Money::new(100), 5, TimeMs::new(1000), None)
            .await
            .unwrap();
        assert!(repo.decrement_lot_remaining(&mut tx, lot.id, 3).await.unwrap());
        assert!(!repo.decrement_lot_remaining(&mut tx, lot.id, 3).await.unwrap());
        assert_eq!(repo.lot_stock_in(&mut tx, pid).await.unwrap(), 2);

        // Exhausted lots drop out of the consumable list.
        assert!(repo.decrement_lot_remaining(&mut tx, lot.id, 2).await.unwrap());
        assert!(repo.list_consumable_lots(&mut tx, pid).await.unwrap().is_empty());
        tx.commit().await.unwrap();

        assert_eq!(repo.list_lots(pid).await.unwrap().len(), 1);
    }
}
