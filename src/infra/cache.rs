use anyhow::Result;
use async_trait::async_trait;
use redis::{AsyncCommands, Client};

use crate::app::persistence::NotificationSlot;

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// The persisted feed, stored as one string value under a fixed key.
#[derive(Clone)]
pub struct RedisSlot {
    cache: RedisCache,
    key: String,
}

impl RedisSlot {
    pub fn new(cache: RedisCache, key: impl Into<String>) -> Self {
        Self {
            cache,
            key: key.into(),
        }
    }
}

#[async_trait]
impl NotificationSlot for RedisSlot {
    async fn load(&self) -> Result<Option<String>> {
        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(&self.key).await?;
        Ok(payload)
    }

    async fn save(&self, payload: String) -> Result<()> {
        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;
        let _: () = conn.set(&self.key, payload).await?;
        Ok(())
    }
}
