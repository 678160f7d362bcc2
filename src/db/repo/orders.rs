//! Order, order item and order counter operations for the repository.

use crate::domain::{
    CustomerInfo, Money, Order, OrderItem, OrderItemId, OrderStatus, ProductId, TimeMs,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use super::{get_parsed, get_uuid, Repository};

const ORDER_COLUMNS: &str = "id, user_id, status, channel, seq, order_number, idempotency_key, \
     total_amount, currency, customer_name, customer_phone, customer_email, customer_address, \
     customer_comment, deleted_at, created_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, title_at_time, price_at_time, \
     cost_price_at_time, packaging_cost_at_time, qty, cogs_total, profit_total";

fn order_from_row(row: &SqliteRow) -> Result<Order, sqlx::Error> {
    Ok(Order {
        id: get_uuid(row, "id")?,
        user_id: row.try_get("user_id")?,
        status: get_parsed(row, "status")?,
        channel: row.try_get("channel")?,
        seq: row.try_get("seq")?,
        order_number: row.try_get("order_number")?,
        idempotency_key: row.try_get("idempotency_key")?,
        total_amount: Money::new(row.try_get("total_amount")?),
        currency: row.try_get("currency")?,
        customer: CustomerInfo {
            name: row.try_get("customer_name")?,
            phone: row.try_get("customer_phone")?,
            email: row.try_get("customer_email")?,
            address: row.try_get("customer_address")?,
            comment: row.try_get("customer_comment")?,
        },
        deleted_at: row.try_get::<Option<i64>, _>("deleted_at")?.map(TimeMs::new),
        created_at: TimeMs::new(row.try_get("created_at")?),
        items: Vec::new(),
    })
}

fn item_from_row(row: &SqliteRow) -> Result<OrderItem, sqlx::Error> {
    Ok(OrderItem {
        id: OrderItemId::new(row.try_get("id")?),
        order_id: get_uuid(row, "order_id")?,
        product_id: ProductId::new(row.try_get("product_id")?),
        title_at_time: row.try_get("title_at_time")?,
        price_at_time: Money::new(row.try_get("price_at_time")?),
        cost_price_at_time: row
            .try_get::<Option<i64>, _>("cost_price_at_time")?
            .map(Money::new),
        packaging_cost_at_time: Money::new(row.try_get("packaging_cost_at_time")?),
        qty: row.try_get("qty")?,
        cogs_total: row.try_get::<Option<i64>, _>("cogs_total")?.map(Money::new),
        profit_total: row.try_get::<Option<i64>, _>("profit_total")?.map(Money::new),
    })
}

impl Repository {
    /// Atomically bump a channel's order counter and return the new value.
    /// The first order on a channel gets 1.
    pub async fn next_order_seq(
        &self,
        conn: &mut SqliteConnection,
        channel: &str,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO order_counters (channel, value) VALUES (?, 1)
            ON CONFLICT(channel) DO UPDATE SET value = value + 1
            RETURNING value
            "#,
        )
        .bind(channel)
        .fetch_one(&mut *conn)
        .await?;
        row.try_get("value")
    }

    /// Insert an order header. Items are inserted separately.
    ///
    /// # Errors
    /// Returns a unique violation if the idempotency key is already taken.
    pub async fn insert_order(
        &self,
        conn: &mut SqliteConnection,
        order: &Order,
        request_hash: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, status, channel, seq, order_number, idempotency_key, request_hash,
                total_amount, currency, customer_name, customer_phone, customer_email,
                customer_address, customer_comment, deleted_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.id.to_string())
        .bind(order.user_id.as_deref())
        .bind(order.status.as_str())
        .bind(&order.channel)
        .bind(order.seq)
        .bind(&order.order_number)
        .bind(order.idempotency_key.as_deref())
        .bind(request_hash)
        .bind(order.total_amount.minor_units())
        .bind(&order.currency)
        .bind(&order.customer.name)
        .bind(order.customer.phone.as_deref())
        .bind(order.customer.email.as_deref())
        .bind(order.customer.address.as_deref())
        .bind(order.customer.comment.as_deref())
        .bind(order.deleted_at.map(|t| t.as_i64()))
        .bind(order.created_at.as_i64())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Insert an order item with `cogs_total`/`profit_total` still NULL.
    /// The returned item carries its generated id.
    pub async fn insert_order_item(
        &self,
        conn: &mut SqliteConnection,
        item: &OrderItem,
    ) -> Result<OrderItem, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO order_items (
                order_id, product_id, title_at_time, price_at_time, cost_price_at_time,
                packaging_cost_at_time, qty, cogs_total, profit_total
            ) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL)
            "#,
        )
        .bind(item.order_id.to_string())
        .bind(item.product_id.as_i64())
        .bind(&item.title_at_time)
        .bind(item.price_at_time.minor_units())
        .bind(item.cost_price_at_time.map(|m| m.minor_units()))
        .bind(item.packaging_cost_at_time.minor_units())
        .bind(item.qty)
        .execute(&mut *conn)
        .await?;

        Ok(OrderItem {
            id: OrderItemId::new(result.last_insert_rowid()),
            cogs_total: None,
            profit_total: None,
            ..item.clone()
        })
    }

    /// Store the allocation result on an order item.
    pub async fn set_order_item_costs(
        &self,
        conn: &mut SqliteConnection,
        item_id: OrderItemId,
        cogs_total: Money,
        profit_total: Money,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE order_items SET cogs_total = ?, profit_total = ? WHERE id = ?")
            .bind(cogs_total.minor_units())
            .bind(profit_total.minor_units())
            .bind(item_id.as_i64())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Look up an order id by idempotency key on the pool.
    pub async fn find_order_id_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let row = sqlx::query("SELECT id FROM orders WHERE idempotency_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(|r| get_uuid(r, "id")).transpose()
    }

    /// Look up an order id by idempotency key inside a transaction.
    pub async fn find_order_id_by_idempotency_key_in(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        let row = sqlx::query("SELECT id FROM orders WHERE idempotency_key = ?")
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(|r| get_uuid(r, "id")).transpose()
    }

    /// Stored request fingerprint of an order, if any.
    pub async fn get_order_request_hash(&self, order_id: Uuid) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query("SELECT request_hash FROM orders WHERE id = ?")
            .bind(order_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row.try_get("request_hash"),
            None => Ok(None),
        }
    }

    /// Load an order with its items, soft-deleted orders included.
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>, sqlx::Error> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(order_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut order = order_from_row(&row)?;

        let sql = format!(
            "SELECT {} FROM order_items WHERE order_id = ? ORDER BY id ASC",
            ITEM_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(order_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        order.items = rows.iter().map(item_from_row).collect::<Result<_, _>>()?;

        Ok(Some(order))
    }

    /// Update an order's status. Returns false if the order does not exist.
    pub async fn set_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(order_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Mark an order deleted. Already-deleted orders keep their original
    /// timestamp. Returns false if the order does not exist.
    pub async fn soft_delete_order(&self, order_id: Uuid, at: TimeMs) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE orders SET deleted_at = COALESCE(deleted_at, ?) WHERE id = ?",
        )
        .bind(at.as_i64())
        .bind(order_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;

    #[tokio::test]
    async fn test_order_counter_is_per_channel() {
        let (repo, _temp) = setup_test_db().await;

        let mut tx = repo.begin().await.unwrap();
        assert_eq!(repo.next_order_seq(&mut tx, "web").await.unwrap(), 1);
        assert_eq!(repo.next_order_seq(&mut tx, "web").await.unwrap(), 2);
        assert_eq!(repo.next_order_seq(&mut tx, "tg").await.unwrap(), 1);
        tx.commit().await.unwrap();

        // A rolled back increment does not burn a number.
        let mut tx = repo.begin().await.unwrap();
        assert_eq!(repo.next_order_seq(&mut tx, "web").await.unwrap(), 3);
        tx.rollback().await.unwrap();

        let mut tx = repo.begin().await.unwrap();
        assert_eq!(repo.next_order_seq(&mut tx, "web").await.unwrap(), 3);
        tx.commit().await.unwrap();
    }
}
