//! 商品目录业务层
//!
//! `ProductCatalog` 是服务契约；`CatalogService` 是真实实现，
//! `CachedCatalog` 是读路径的 Redis 旁路缓存装饰器（不在 saga 关键路径上）。
//!
//! saga 参与逻辑：
//! - `reserve`：消费 `OrderCreated`，单事务内按行扣减库存并汇总金额，
//!   任一商品会超卖则整体回滚、不发事件；成功则同事务入队
//!   `InventoryReserved` 到 `payment_events`。
//! - `return_stock`：消费 `OrderCancelled`，单事务内按记录数量回补库存。
//!
//! 两个 handler 都以事件 `event_id` 做收件箱去重，且标记与库存变更
//! 共享同一事务，broker 任意重投下库存不会被多扣或多补。

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use shop_shared::cache::{Cache, CacheKey};
use shop_shared::error::ShopError;
use shop_shared::events::{InventoryReserved, OrderCancelled, OrderCreated, ProductCreated, event_types};
use shop_shared::inbox;
use shop_shared::kafka::topics;
use shop_shared::outbox::{NewOutboxEvent, OutboxRepository};

use crate::domain::{NewProduct, Product};
use crate::error::Result;
use crate::repository::ProductRepository;

/// 商品读缓存 TTL
const PRODUCT_CACHE_TTL: Duration = Duration::from_secs(600);

/// 商品目录服务契约
///
/// gRPC 层和消费者只依赖此 trait，测试可以替换内存实现，
/// 生产按需叠加缓存装饰器。
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn create(&self, product: NewProduct) -> Result<i64>;
    async fn get(&self, id: i64) -> Result<Product>;
    async fn list(&self, limit: i64, offset: i64, search: &str) -> Result<(Vec<Product>, i64)>;
    async fn delete(&self, id: i64) -> Result<()>;
    async fn decrease_stock(&self, id: i64, quantity: i64) -> Result<()>;
    async fn reserve(&self, event: &OrderCreated) -> Result<()>;
    async fn return_stock(&self, event: &OrderCancelled) -> Result<()>;
}

// ---------------------------------------------------------------------------
// CatalogService — 真实实现
// ---------------------------------------------------------------------------

pub struct CatalogService {
    pool: PgPool,
    product_repo: ProductRepository,
}

impl CatalogService {
    pub fn new(pool: PgPool, product_repo: ProductRepository) -> Self {
        Self { pool, product_repo }
    }
}

#[async_trait]
impl ProductCatalog for CatalogService {
    /// 创建商品，同事务入队 `ProductCreated`（预留给下游订阅方）
    #[instrument(skip(self, product))]
    async fn create(&self, product: NewProduct) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(ShopError::from)?;

        let id = ProductRepository::create(&mut tx, &product).await?;

        let event = ProductCreated {
            product_id: id,
            event_id: 0,
        };
        let outbox_event = NewOutboxEvent::new(
            "Product",
            id,
            event_types::PRODUCT_CREATED,
            &event,
            topics::PRODUCT_EVENTS,
        )
        .map_err(crate::error::CatalogError::Shared)?;
        OutboxRepository::save(&mut tx, &outbox_event)
            .await
            .map_err(crate::error::CatalogError::Shared)?;

        tx.commit().await.map_err(ShopError::from)?;

        info!(product_id = id, name = %product.name, "商品创建成功");
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Product> {
        self.product_repo.get_by_id(id).await
    }

    async fn list(&self, limit: i64, offset: i64, search: &str) -> Result<(Vec<Product>, i64)> {
        self.product_repo.list(limit, offset, search).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.product_repo.delete_by_id(id).await
    }

    /// 运营侧直接扣减库存（非 saga 路径）
    #[instrument(skip(self))]
    async fn decrease_stock(&self, id: i64, quantity: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(ShopError::from)?;
        ProductRepository::decrease_stock(&mut tx, id, quantity).await?;
        tx.commit().await.map_err(ShopError::from)?;
        Ok(())
    }

    /// 为订单预留库存
    #[instrument(skip(self, event), fields(order_id = event.order_id))]
    async fn reserve(&self, event: &OrderCreated) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(ShopError::from)?;

        if !inbox::try_mark_processed(&mut tx, event.event_id)
            .await
            .map_err(crate::error::CatalogError::Shared)?
        {
            tx.commit().await.map_err(ShopError::from)?;
            return Ok(());
        }

        let mut total: i64 = 0;
        for item in &event.items {
            let price =
                ProductRepository::decrease_stock(&mut tx, item.product_id, item.quantity as i64)
                    .await?;
            total += price * item.quantity as i64;
        }

        let reserved = InventoryReserved {
            order_id: event.order_id,
            user_id: event.user_id,
            amount: total,
            reserved_at: Utc::now(),
            event_id: 0,
        };
        let outbox_event = NewOutboxEvent::new(
            "Inventory",
            event.order_id,
            event_types::INVENTORY_RESERVED,
            &reserved,
            topics::PAYMENT_EVENTS,
        )
        .map_err(crate::error::CatalogError::Shared)?;
        OutboxRepository::save(&mut tx, &outbox_event)
            .await
            .map_err(crate::error::CatalogError::Shared)?;

        tx.commit().await.map_err(ShopError::from)?;

        info!(
            order_id = event.order_id,
            amount = total,
            "库存预留成功"
        );
        Ok(())
    }

    /// 取消补偿：按订单行记录的数量回补库存
    #[instrument(skip(self, event), fields(order_id = event.order_id))]
    async fn return_stock(&self, event: &OrderCancelled) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(ShopError::from)?;

        if !inbox::try_mark_processed(&mut tx, event.event_id)
            .await
            .map_err(crate::error::CatalogError::Shared)?
        {
            tx.commit().await.map_err(ShopError::from)?;
            return Ok(());
        }

        for item in &event.items {
            ProductRepository::increase_stock(&mut tx, item.product_id, item.quantity as i64)
                .await?;
        }

        tx.commit().await.map_err(ShopError::from)?;

        info!(order_id = event.order_id, "库存回补完成");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CachedCatalog — 读路径缓存装饰器
// ---------------------------------------------------------------------------

/// 商品读缓存装饰器
///
/// 只缓存按 ID 读取；删除和库存扣减会使对应键失效，
/// 本节点的本地变更之后不会读到陈旧数据。缓存故障一律降级为
/// 直接访问底层实现，绝不让缓存拖垮请求。
pub struct CachedCatalog<S> {
    next: S,
    cache: Cache,
}

impl<S: ProductCatalog> CachedCatalog<S> {
    pub fn new(next: S, cache: Cache) -> Self {
        Self { next, cache }
    }

    async fn invalidate(&self, id: i64) {
        if let Err(e) = self.cache.delete(&CacheKey::product(id)).await {
            warn!(product_id = id, error = %e, "缓存失效操作失败");
        }
    }
}

#[async_trait]
impl<S: ProductCatalog> ProductCatalog for CachedCatalog<S> {
    async fn create(&self, product: NewProduct) -> Result<i64> {
        self.next.create(product).await
    }

    async fn get(&self, id: i64) -> Result<Product> {
        let key = CacheKey::product(id);

        match self.cache.get::<Product>(&key).await {
            Ok(Some(product)) => return Ok(product),
            Ok(None) => {}
            Err(e) => warn!(product_id = id, error = %e, "读缓存失败，回退数据库"),
        }

        let product = self.next.get(id).await?;

        if let Err(e) = self.cache.set(&key, &product, PRODUCT_CACHE_TTL).await {
            warn!(product_id = id, error = %e, "写缓存失败");
        }

        Ok(product)
    }

    async fn list(&self, limit: i64, offset: i64, search: &str) -> Result<(Vec<Product>, i64)> {
        self.next.list(limit, offset, search).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.next.delete(id).await?;
        self.invalidate(id).await;
        Ok(())
    }

    async fn decrease_stock(&self, id: i64, quantity: i64) -> Result<()> {
        self.next.decrease_stock(id, quantity).await?;
        self.invalidate(id).await;
        Ok(())
    }

    async fn reserve(&self, event: &OrderCreated) -> Result<()> {
        self.next.reserve(event).await?;
        // 预留改变了库存，逐键失效
        for item in &event.items {
            self.invalidate(item.product_id).await;
        }
        Ok(())
    }

    async fn return_stock(&self, event: &OrderCancelled) -> Result<()> {
        self.next.return_stock(event).await?;
        for item in &event.items {
            self.invalidate(item.product_id).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_cache_ttl() {
        assert_eq!(PRODUCT_CACHE_TTL, Duration::from_secs(600));
    }

    #[test]
    fn test_cache_key_matches_contract() {
        // 缓存键格式是与失效逻辑共享的契约
        assert_eq!(CacheKey::product(42), "product:42");
    }
}
