use anyhow::Result;
use async_trait::async_trait;
use sqlx::Row;

use crate::app::seed::SeedSource;
use crate::domain::change::{AccountRecord, InventoryRecord, OrderRecord};
use crate::infra::db::Db;

/// Seed queries against the storefront tables.
#[derive(Clone)]
pub struct PgSeedSource {
    db: Db,
}

impl PgSeedSource {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SeedSource for PgSeedSource {
    async fn recent_orders(&self, limit: i64) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(
            "SELECT id, total::float8 AS total, status::text AS status, customer_name, \
                    created_at, updated_at \
             FROM orders \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(OrderRecord {
                id: row.get("id"),
                total: row.get("total"),
                status: row.get("status"),
                customer_name: row.get("customer_name"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            });
        }

        Ok(orders)
    }

    async fn recent_accounts(&self, limit: i64) -> Result<Vec<AccountRecord>> {
        let rows = sqlx::query(
            "SELECT id, email, full_name, role::text AS role, created_at \
             FROM profiles \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            accounts.push(AccountRecord {
                id: row.get("id"),
                email: row.get("email"),
                full_name: row.get("full_name"),
                role: row.get("role"),
                created_at: row.get("created_at"),
            });
        }

        Ok(accounts)
    }

    async fn low_stock(&self, threshold: i64) -> Result<Vec<InventoryRecord>> {
        let rows = sqlx::query(
            "SELECT id, name, stock::int8 AS stock, updated_at \
             FROM products \
             WHERE stock <= $1 \
             ORDER BY stock ASC, updated_at DESC NULLS LAST",
        )
        .bind(threshold)
        .fetch_all(self.db.pool())
        .await?;

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            products.push(InventoryRecord {
                id: row.get("id"),
                name: row.get("name"),
                stock: row.get("stock"),
                updated_at: row.get("updated_at"),
            });
        }

        Ok(products)
    }
}
