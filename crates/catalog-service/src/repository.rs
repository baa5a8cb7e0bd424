//! 商品仓储
//!
//! 库存扣减用条件更新表达：`stock_quantity >= N` 不满足时更新 0 行，
//! 由调用方映射为库存不足。库存永不为负的约束因此落在单条 SQL 上，
//! 并发扣减也不会超卖。

use sqlx::{PgConnection, PgPool};
use tracing::warn;

use shop_shared::error::ShopError;

use crate::domain::{NewProduct, Product};
use crate::error::Result;

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock_quantity, \
     image_url, category, created_at, updated_at";

/// 商品仓储
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 按 ID 查询（软删除的行不可见）
    pub async fn get_by_id(&self, id: i64) -> Result<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        product.ok_or_else(|| {
            ShopError::NotFound {
                entity: "Product".to_string(),
                id: id.to_string(),
            }
            .into()
        })
    }

    /// 分页列出商品，支持按名称模糊搜索，返回 (商品列表, 总数)
    pub async fn list(
        &self,
        limit: i64,
        offset: i64,
        search: &str,
    ) -> Result<(Vec<Product>, i64)> {
        let (products, total) = if search.is_empty() {
            let products = sqlx::query_as::<_, Product>(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE deleted_at IS NULL \
                 ORDER BY created_at DESC LIMIT $1 OFFSET $2"
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

            let total: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE deleted_at IS NULL")
                    .fetch_one(&self.pool)
                    .await?;

            (products, total)
        } else {
            let pattern = format!("%{}%", search);

            let products = sqlx::query_as::<_, Product>(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products \
                 WHERE deleted_at IS NULL AND name ILIKE $1 \
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
            ))
            .bind(&pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM products WHERE deleted_at IS NULL AND name ILIKE $1",
            )
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

            (products, total)
        };

        Ok((products, total))
    }

    // ==================== 写入操作 ====================

    /// 创建商品（在调用方事务中）
    pub async fn create(conn: &mut PgConnection, product: &NewProduct) -> Result<i64> {
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO products (name, description, price, stock_quantity, image_url, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock_quantity)
        .bind(&product.image_url)
        .bind(&product.category)
        .fetch_one(conn)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(e) => {
                let err = ShopError::from(e);
                if err.is_unique_violation() {
                    return Err(ShopError::AlreadyExists {
                        entity: "Product".to_string(),
                        field: "name".to_string(),
                        value: product.name.clone(),
                    }
                    .into());
                }
                Err(err.into())
            }
        }
    }

    /// 软删除商品
    pub async fn delete_by_id(&self, id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ShopError::NotFound {
                entity: "Product".to_string(),
                id: id.to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// 扣减库存（在调用方事务中），返回商品单价
    ///
    /// 条件更新失败（0 行受影响）即预留会超卖，映射为库存不足。
    pub async fn decrease_stock(conn: &mut PgConnection, id: i64, quantity: i64) -> Result<i64> {
        let price: Option<i64> =
            sqlx::query_scalar("SELECT price FROM products WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        let Some(price) = price else {
            return Err(ShopError::NotFound {
                entity: "Product".to_string(),
                id: id.to_string(),
            }
            .into());
        };

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - $2, updated_at = NOW()
            WHERE id = $1
              AND stock_quantity >= $2
              AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(quantity)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            warn!(product_id = id, quantity, "库存不足，扣减被拒绝");
            return Err(ShopError::InsufficientStock {
                product_id: id,
                requested: quantity,
            }
            .into());
        }

        Ok(price)
    }

    /// 回补库存（在调用方事务中）
    pub async fn increase_stock(conn: &mut PgConnection, id: i64, quantity: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            warn!(product_id = id, "回补库存时商品不存在");
            return Err(ShopError::NotFound {
                entity: "Product".to_string(),
                id: id.to_string(),
            }
            .into());
        }

        Ok(())
    }
}
