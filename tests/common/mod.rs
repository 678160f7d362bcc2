#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use stockledger::config::Config;
use stockledger::db::init_db;
use stockledger::domain::{
    CustomerInfo, InventoryLot, Money, NewOrder, NewPurchase, OrderLine, Product, ProductId,
    ProductStatus, PurchaseLine, TimeMs,
};
use stockledger::notify::{NotifyEvent, RecordingNotifier};
use stockledger::orchestration::{
    AnalyticsService, OrderService, ReceivingService, WriteOffService,
};
use stockledger::Repository;
use tempfile::TempDir;

pub struct TestEnv {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub notifier: Arc<RecordingNotifier>,
    pub orders: OrderService,
    pub write_offs: WriteOffService,
    pub receiving: ReceivingService,
    pub analytics: AnalyticsService,
    _temp: TempDir,
}

pub async fn setup() -> TestEnv {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let config = Config {
        tx_retry_max_ms: 10_000,
        ..Config::for_database(db_path)
    };
    let notifier = Arc::new(RecordingNotifier::new());

    TestEnv {
        orders: OrderService::new(repo.clone(), notifier.clone(), &config),
        write_offs: WriteOffService::new(repo.clone(), notifier.clone(), &config),
        receiving: ReceivingService::new(repo.clone(), &config),
        analytics: AnalyticsService::new(repo.clone()),
        repo,
        config,
        notifier,
        _temp: temp_dir,
    }
}

impl TestEnv {
    /// Register an active product.
    pub async fn product(&self, id: i64, price: i64, cost_price: Option<i64>) -> Product {
        let product = Product {
            id: ProductId::new(id),
            title: format!("Product {}", id),
            price: Money::new(price),
            cost_price: cost_price.map(Money::new),
            packaging_cost: None,
            status: ProductStatus::Active,
        };
        self.repo.upsert_product(&product).await.unwrap();
        product
    }

    /// Receive one lot per `(qty, unit_cost)` pair, oldest first.
    pub async fn lots(&self, product_id: i64, lots: &[(i64, i64)]) -> Vec<InventoryLot> {
        let mut received = Vec::new();
        for (i, &(qty, unit_cost)) in lots.iter().enumerate() {
            let purchase = self
                .receiving
                .post_purchase(NewPurchase {
                    supplier: None,
                    freight_cost: Money::zero(),
                    received_at: Some(TimeMs::new(1_000 + i as i64)),
                    lines: vec![PurchaseLine {
                        product_id: ProductId::new(product_id),
                        qty,
                        unit_cost: Money::new(unit_cost),
                    }],
                })
                .await
                .unwrap();
            received.extend(purchase.lots);
        }
        received
    }

    pub async fn ledger_stock(&self, product_id: i64) -> i64 {
        self.repo.current_stock(ProductId::new(product_id)).await.unwrap()
    }

    pub async fn lot_stock(&self, product_id: i64) -> i64 {
        self.repo.lot_stock(ProductId::new(product_id)).await.unwrap()
    }

    /// Remaining quantity of every lot of a product, FIFO order.
    pub async fn remaining(&self, product_id: i64) -> Vec<i64> {
        self.repo
            .list_lots(ProductId::new(product_id))
            .await
            .unwrap()
            .iter()
            .map(|l| l.qty_remaining)
            .collect()
    }

    /// Wait until the notifier has seen `n` events.
    pub async fn events(&self, n: usize) -> Vec<NotifyEvent> {
        for _ in 0..100 {
            let events = self.notifier.events();
            if events.len() >= n {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notifier.events()
    }
}

pub fn customer() -> CustomerInfo {
    CustomerInfo {
        name: "Ada Lovelace".to_string(),
        phone: Some("+7 900 000-00-00".to_string()),
        ..Default::default()
    }
}

pub fn order(lines: &[(i64, i64)]) -> NewOrder {
    NewOrder::new(
        lines
            .iter()
            .map(|&(product_id, qty)| OrderLine {
                product_id: ProductId::new(product_id),
                qty,
            })
            .collect(),
        customer(),
    )
}
