//! Order creation and order management.

use super::allocation::allocate;
use super::retry::run_with_retry;
use super::{FulfillmentError, OutOfStock};
use crate::config::Config;
use crate::db::repo::is_unique_violation;
use crate::db::Repository;
use crate::domain::{
    format_order_number, ConsumerRef, Money, MovementKind, NewOrder, Order, OrderItem,
    OrderItemId, OrderStatus, Product, ProductId, SourceKind, TimeMs,
};
use crate::engine::invariants::check_ledger_balance;
use crate::engine::line_profit;
use crate::notify::{self, Notifier, NotifyEvent, OrderCreated};
use sqlx::sqlite::SqliteConnection;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Longest accepted idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

enum Created {
    New(Order),
    /// The idempotency key was already used by this order.
    Replayed(Uuid),
}

#[derive(Clone)]
pub struct OrderService {
    repo: Arc<Repository>,
    notifier: Arc<dyn Notifier>,
    default_channel: String,
    currency: String,
    retry_max: Duration,
}

impl OrderService {
    pub fn new(repo: Arc<Repository>, notifier: Arc<dyn Notifier>, config: &Config) -> Self {
        Self {
            repo,
            notifier,
            default_channel: config.default_channel.clone(),
            currency: config.currency.clone(),
            retry_max: config.tx_retry_max(),
        }
    }

    /// Create an order, allocating every line FIFO, in one transaction.
    ///
    /// With an idempotency key that was already used, the stored order is
    /// returned and nothing else happens.
    pub async fn create_order(&self, request: NewOrder) -> Result<Order, FulfillmentError> {
        if let Some(key) = &request.idempotency_key {
            validate_idempotency_key(key)?;
            if let Some(order_id) = self.repo.find_order_id_by_idempotency_key(key).await? {
                return self.replay(order_id, &request).await;
            }
        }

        let channel = request
            .channel
            .as_deref()
            .map(str::trim)
            .unwrap_or(&self.default_channel)
            .to_string();
        validate_request(&request, &channel)?;
        let demand = aggregate_demand(&request);
        let request_hash = request.request_hash();

        let created = run_with_retry("create_order", self.retry_max, || {
            self.create_order_tx(&request, &channel, &demand, &request_hash)
        })
        .await?;

        match created {
            Created::New(order) => {
                info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    items = order.items.len(),
                    total = order.total_amount.minor_units(),
                    "Order created"
                );
                notify::dispatch(
                    self.notifier.clone(),
                    NotifyEvent::OrderCreated(OrderCreated {
                        order_id: order.id,
                        order_number: order.order_number.clone(),
                        channel: order.channel.clone(),
                        customer_name: order.customer.name.clone(),
                        total_amount: order.total_amount,
                        currency: order.currency.clone(),
                        item_count: order.items.len(),
                        created_at: order.created_at,
                    }),
                );
                Ok(order)
            }
            Created::Replayed(order_id) => self.replay(order_id, &request).await,
        }
    }

    async fn replay(&self, order_id: Uuid, request: &NewOrder) -> Result<Order, FulfillmentError> {
        let stored_hash = self.repo.get_order_request_hash(order_id).await?;
        if stored_hash.as_deref() != Some(request.request_hash().as_str()) {
            warn!(
                order_id = %order_id,
                idempotency_key = request.idempotency_key.as_deref().unwrap_or_default(),
                "Idempotency key replayed with different lines, returning stored order"
            );
        }
        info!(order_id = %order_id, "Idempotent replay of existing order");
        self.get_order(order_id).await
    }

    async fn create_order_tx(
        &self,
        request: &NewOrder,
        channel: &str,
        demand: &BTreeMap<ProductId, i64>,
        request_hash: &str,
    ) -> Result<Created, FulfillmentError> {
        let mut tx = self.repo.begin().await?;
        let product_ids: Vec<ProductId> = demand.keys().copied().collect();
        self.repo.lock_lots(&mut tx, &product_ids).await?;

        // A concurrent request with the same key may have committed while we
        // waited for the lock.
        if let Some(key) = &request.idempotency_key {
            if let Some(order_id) = self.repo.find_order_id_by_idempotency_key_in(&mut tx, key).await? {
                tx.rollback().await?;
                return Ok(Created::Replayed(order_id));
            }
        }

        let products = self.check_stock(&mut tx, demand).await?;

        let seq = self.repo.next_order_seq(&mut tx, channel).await?;
        let mut total_amount = Money::zero();
        for line in &request.lines {
            let product = &products[&line.product_id];
            total_amount = product
                .price
                .checked_times(line.qty)
                .and_then(|line_total| total_amount.checked_add(line_total))
                .ok_or_else(|| FulfillmentError::Validation("order total overflows".to_string()))?;
        }

        let mut order = Order {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            status: OrderStatus::New,
            channel: channel.to_string(),
            seq,
            order_number: format_order_number(seq, channel),
            idempotency_key: request.idempotency_key.clone(),
            total_amount,
            currency: self.currency.clone(),
            customer: request.customer.clone(),
            deleted_at: None,
            created_at: TimeMs::now(),
            items: Vec::with_capacity(request.lines.len()),
        };

        match self.repo.insert_order(&mut tx, &order, Some(request_hash)).await {
            Ok(()) => {}
            Err(e) if is_unique_violation(&e) && request.idempotency_key.is_some() => {
                tx.rollback().await?;
                let key = request.idempotency_key.as_deref().unwrap_or_default();
                return match self.repo.find_order_id_by_idempotency_key(key).await? {
                    Some(order_id) => Ok(Created::Replayed(order_id)),
                    None => Err(FulfillmentError::Storage(e)),
                };
            }
            Err(e) => return Err(e.into()),
        }

        for line in &request.lines {
            let product = &products[&line.product_id];
            let item = self
                .repo
                .insert_order_item(
                    &mut tx,
                    &OrderItem {
                        id: OrderItemId::new(0),
                        order_id: order.id,
                        product_id: product.id,
                        title_at_time: product.title.clone(),
                        price_at_time: product.price,
                        cost_price_at_time: product.cost_price,
                        packaging_cost_at_time: product.packaging_cost.unwrap_or_default(),
                        qty: line.qty,
                        cogs_total: None,
                        profit_total: None,
                    },
                )
                .await?;

            let outcome = allocate(
                &self.repo,
                &mut tx,
                product.id,
                line.qty,
                ConsumerRef::OrderItem(item.id),
            )
            .await
            .map_err(|e| e.with_product_title(&product.title))?;

            let profit = line_profit(
                item.price_at_time,
                item.qty,
                outcome.total_cost,
                item.packaging_cost_at_time,
            )
            .ok_or_else(|| {
                FulfillmentError::invariant(format!("profit of order item {} overflows", item.id))
            })?;
            self.repo
                .set_order_item_costs(&mut tx, item.id, outcome.total_cost, profit)
                .await?;

            order.items.push(OrderItem {
                cogs_total: Some(outcome.total_cost),
                profit_total: Some(profit),
                ..item
            });
        }

        let source_id = order.id.to_string();
        for (&product_id, &qty) in demand {
            self.repo
                .append_movement(
                    &mut tx,
                    product_id,
                    -qty,
                    MovementKind::Out,
                    SourceKind::Order,
                    Some(&source_id),
                    None,
                )
                .await?;
            let ledger = self.repo.current_stock_in(&mut tx, product_id).await?;
            let lots = self.repo.lot_stock_in(&mut tx, product_id).await?;
            check_ledger_balance(product_id, ledger, lots)?;
        }

        tx.commit().await?;
        Ok(Created::New(order))
    }

    /// Load every product in `demand`, require it active and in stock.
    async fn check_stock(
        &self,
        conn: &mut SqliteConnection,
        demand: &BTreeMap<ProductId, i64>,
    ) -> Result<HashMap<ProductId, Product>, FulfillmentError> {
        let mut products = HashMap::with_capacity(demand.len());
        for (&product_id, &requested) in demand {
            let product = self
                .repo
                .get_product_in(conn, product_id)
                .await?
                .ok_or_else(|| FulfillmentError::NotFound(format!("product {}", product_id)))?;
            if !product.is_active() {
                return Err(FulfillmentError::Validation(format!(
                    "product {} ({}) is {}",
                    product.id, product.title, product.status
                )));
            }

            let available = self.repo.current_stock_in(conn, product_id).await?;
            if available < requested {
                return Err(FulfillmentError::OutOfStock(OutOfStock {
                    product_id,
                    product_title: product.title.clone(),
                    available,
                    requested,
                }));
            }
            products.insert(product_id, product);
        }
        Ok(products)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, FulfillmentError> {
        self.repo
            .get_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::NotFound(format!("order {}", order_id)))
    }

    /// Change an order's status. Stock and allocations are not touched.
    pub async fn set_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, FulfillmentError> {
        if !self.repo.set_order_status(order_id, status).await? {
            return Err(FulfillmentError::NotFound(format!("order {}", order_id)));
        }
        info!(order_id = %order_id, status = %status, "Order status changed");
        self.get_order(order_id).await
    }

    /// Hide an order from reports. Stock and allocations are not touched.
    pub async fn soft_delete_order(&self, order_id: Uuid) -> Result<Order, FulfillmentError> {
        if !self.repo.soft_delete_order(order_id, TimeMs::now()).await? {
            return Err(FulfillmentError::NotFound(format!("order {}", order_id)));
        }
        info!(order_id = %order_id, "Order soft-deleted");
        self.get_order(order_id).await
    }
}

fn validate_idempotency_key(key: &str) -> Result<(), FulfillmentError> {
    if key.trim().is_empty() {
        return Err(FulfillmentError::Validation(
            "idempotency key must not be empty".to_string(),
        ));
    }
    if key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(FulfillmentError::Validation(format!(
            "idempotency key longer than {} characters",
            MAX_IDEMPOTENCY_KEY_LEN
        )));
    }
    Ok(())
}

fn validate_request(request: &NewOrder, channel: &str) -> Result<(), FulfillmentError> {
    if request.lines.is_empty() {
        return Err(FulfillmentError::Validation(
            "order must have at least one line".to_string(),
        ));
    }
    if let Some(line) = request.lines.iter().find(|l| l.qty <= 0) {
        return Err(FulfillmentError::Validation(format!(
            "quantity for product {} must be positive, got {}",
            line.product_id, line.qty
        )));
    }
    if channel.is_empty() {
        return Err(FulfillmentError::Validation("channel must not be empty".to_string()));
    }
    if request.customer.name.trim().is_empty() {
        return Err(FulfillmentError::Validation(
            "customer name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Total requested quantity per distinct product. Several lines for the same
/// product are checked against stock together.
fn aggregate_demand(request: &NewOrder) -> BTreeMap<ProductId, i64> {
    let mut demand = BTreeMap::new();
    for line in &request.lines {
        let total = demand.entry(line.product_id).or_insert(0i64);
        *total = total.saturating_add(line.qty);
    }
    demand
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CustomerInfo, OrderLine};

    fn request(lines: &[(i64, i64)]) -> NewOrder {
        NewOrder::new(
            lines
                .iter()
                .map(|&(p, q)| OrderLine {
                    product_id: ProductId::new(p),
                    qty: q,
                })
                .collect(),
            CustomerInfo {
                name: "Ada".to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_aggregate_demand_sums_duplicate_products() {
        let demand = aggregate_demand(&request(&[(2, 3), (1, 1), (2, 4)]));
        assert_eq!(demand.len(), 2);
        assert_eq!(demand[&ProductId::new(1)], 1);
        assert_eq!(demand[&ProductId::new(2)], 7);
    }

    #[test]
    fn test_validate_request() {
        assert!(validate_request(&request(&[(1, 1)]), "web").is_ok());
        assert!(matches!(
            validate_request(&request(&[]), "web"),
            Err(FulfillmentError::Validation(_))
        ));
        assert!(matches!(
            validate_request(&request(&[(1, 0)]), "web"),
            Err(FulfillmentError::Validation(_))
        ));
        assert!(matches!(
            validate_request(&request(&[(1, 1)]), ""),
            Err(FulfillmentError::Validation(_))
        ));

        let mut anonymous = request(&[(1, 1)]);
        anonymous.customer.name = " ".to_string();
        assert!(matches!(
            validate_request(&anonymous, "web"),
            Err(FulfillmentError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_idempotency_key() {
        assert!(validate_idempotency_key("abc").is_ok());
        assert!(validate_idempotency_key("").is_err());
        assert!(validate_idempotency_key(&"k".repeat(MAX_IDEMPOTENCY_KEY_LEN)).is_ok());
        assert!(validate_idempotency_key(&"k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1)).is_err());
    }
}
