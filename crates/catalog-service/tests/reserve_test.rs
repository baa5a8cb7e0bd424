//! 库存预留与补偿集成测试
//!
//! 使用真实 PostgreSQL 验证：
//! - 预留成功原子扣减库存并入队 InventoryReserved
//! - 任一商品库存不足则整体回滚、不发事件
//! - 补偿回补库存到预留前水位
//! - 重复投递（相同 event_id）下库存只变化一次
//!
//! ## 运行方式
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo test -p catalog-service -- --ignored
//! ```

use sqlx::PgPool;

use catalog_service::error::CatalogError;
use catalog_service::repository::ProductRepository;
use catalog_service::service::{CatalogService, ProductCatalog};
use shop_shared::error::ShopError;
use shop_shared::events::{
    OrderCancelled, OrderCancelledItem, OrderCreated, OrderCreatedItem,
};

async fn connect() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPool::connect(&url).await.expect("数据库连接失败")
}

/// 建表（幂等），让测试可以在空库上直接运行
async fn setup_schema(pool: &PgPool) {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            price BIGINT NOT NULL,
            stock_quantity BIGINT NOT NULL,
            image_url TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at TIMESTAMPTZ
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS processed_events (
            event_id BIGINT PRIMARY KEY,
            processed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS outbox (
            id BIGSERIAL PRIMARY KEY,
            aggregate_type TEXT NOT NULL,
            aggregate_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            payload JSONB NOT NULL,
            headers JSONB NOT NULL DEFAULT '{}'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            published_at TIMESTAMPTZ,
            attempts BIGINT NOT NULL DEFAULT 0,
            last_error TEXT,
            topic TEXT NOT NULL
        )
        "#,
    ];

    for stmt in statements {
        sqlx::query(stmt).execute(pool).await.expect("建表失败");
    }
}

fn service(pool: &PgPool) -> CatalogService {
    CatalogService::new(pool.clone(), ProductRepository::new(pool.clone()))
}

/// 以唯一名称插入测试商品，返回商品 ID
async fn seed_product(pool: &PgPool, stock: i64, price: i64) -> i64 {
    let name = format!("测试商品-{}", chrono::Utc::now().timestamp_micros());
    sqlx::query_scalar(
        "INSERT INTO products (name, price, stock_quantity) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(name)
    .bind(price)
    .bind(stock)
    .fetch_one(pool)
    .await
    .expect("插入测试商品失败")
}

async fn stock_of(pool: &PgPool, product_id: i64) -> i64 {
    sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("查询库存失败")
}

/// 为每次预留生成唯一事件 ID
fn fresh_event_id() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

fn order_created(order_id: i64, product_id: i64, quantity: i32, event_id: i64) -> OrderCreated {
    OrderCreated {
        order_id,
        user_id: 999,
        items: vec![OrderCreatedItem {
            product_id,
            quantity,
        }],
        event_id,
    }
}

#[tokio::test]
#[ignore] // 需要数据库连接（DATABASE_URL）
async fn test_reserve_decrements_stock_and_enqueues_event() {
    let pool = connect().await;
    setup_schema(&pool).await;
    let svc = service(&pool);

    let product_id = seed_product(&pool, 3, 5350).await;
    let order_id = fresh_event_id();

    svc.reserve(&order_created(order_id, product_id, 1, fresh_event_id()))
        .await
        .expect("预留失败");

    assert_eq!(stock_of(&pool, product_id).await, 2);

    let payload: serde_json::Value = sqlx::query_scalar(
        "SELECT payload FROM outbox WHERE aggregate_id = $1 AND event_type = 'InventoryReserved'",
    )
    .bind(order_id.to_string())
    .fetch_one(&pool)
    .await
    .expect("未找到 InventoryReserved 发件箱行");

    // 金额按当前单价汇总
    assert_eq!(payload["payload"]["amount"], 5350);
    assert_eq!(payload["payload"]["order_id"], order_id);
}

#[tokio::test]
#[ignore] // 需要数据库连接（DATABASE_URL）
async fn test_insufficient_stock_rolls_back_everything() {
    let pool = connect().await;
    setup_schema(&pool).await;
    let svc = service(&pool);

    let product_id = seed_product(&pool, 1, 100).await;
    let order_id = fresh_event_id();

    // 请求 2 件但只有 1 件库存
    let result = svc
        .reserve(&order_created(order_id, product_id, 2, fresh_event_id()))
        .await;

    assert!(matches!(
        result,
        Err(CatalogError::Shared(ShopError::InsufficientStock { .. }))
    ));

    // 库存未变
    assert_eq!(stock_of(&pool, product_id).await, 1);

    // 没有发出任何事件
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM outbox WHERE aggregate_id = $1 AND event_type = 'InventoryReserved'",
    )
    .bind(order_id.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[ignore] // 需要数据库连接（DATABASE_URL）
async fn test_reserve_is_idempotent_by_event_id() {
    let pool = connect().await;
    setup_schema(&pool).await;
    let svc = service(&pool);

    let product_id = seed_product(&pool, 5, 100).await;
    let event_id = fresh_event_id();
    let event = order_created(fresh_event_id(), product_id, 1, event_id);

    svc.reserve(&event).await.expect("首次预留失败");
    // 相同 event_id 重投：库存不再变化
    svc.reserve(&event).await.expect("重复投递应幂等");

    assert_eq!(stock_of(&pool, product_id).await, 4);
}

#[tokio::test]
#[ignore] // 需要数据库连接（DATABASE_URL）
async fn test_return_stock_restores_pre_reservation_level() {
    let pool = connect().await;
    setup_schema(&pool).await;
    let svc = service(&pool);

    let product_id = seed_product(&pool, 3, 5350).await;
    let order_id = fresh_event_id();

    svc.reserve(&order_created(order_id, product_id, 1, fresh_event_id()))
        .await
        .unwrap();
    assert_eq!(stock_of(&pool, product_id).await, 2);

    let cancelled = OrderCancelled {
        order_id,
        items: vec![OrderCancelledItem {
            product_id,
            name: "测试商品".to_string(),
            price: 5350,
            quantity: 1,
        }],
        event_id: fresh_event_id(),
    };

    svc.return_stock(&cancelled).await.expect("回补失败");
    assert_eq!(stock_of(&pool, product_id).await, 3);

    // 重复投递同一补偿事件：库存不会多补
    svc.return_stock(&cancelled).await.expect("重复投递应幂等");
    assert_eq!(stock_of(&pool, product_id).await, 3);
}
