pub mod policy;

use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::config::policy::{FeedPolicy, ReconnectPolicy};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub redis_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub admin_token: Option<String>,
    pub persistence_key: String,
    pub watch_content_submissions: bool,
    pub log_alerts: bool,
    pub feed: FeedPolicy,
    pub reconnect: ReconnectPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        let feed = FeedPolicy {
            capacity: env_or_parse("NOTIFICATION_CAPACITY", "50")?,
            high_value_order_total: env_or_parse("HIGH_VALUE_ORDER_TOTAL", "10000")?,
            low_stock_threshold: env_or_parse("LOW_STOCK_THRESHOLD", "5")?,
            seed_order_limit: env_or_parse("SEED_ORDER_LIMIT", "10")?,
            seed_account_limit: env_or_parse("SEED_ACCOUNT_LIMIT", "5")?,
        };
        if feed.capacity == 0 {
            return Err(anyhow!("invalid NOTIFICATION_CAPACITY: must be positive"));
        }

        let reconnect = ReconnectPolicy {
            base_delay: Duration::from_millis(env_or_parse("RECONNECT_BASE_DELAY_MS", "1000")?),
            max_delay: Duration::from_millis(env_or_parse("RECONNECT_MAX_DELAY_MS", "30000")?),
            max_attempts: env_or_parse("RECONNECT_MAX_ATTEMPTS", "5")?,
            subscribe_timeout: Duration::from_secs(env_or_parse("SUBSCRIBE_TIMEOUT_SECONDS", "10")?),
        };

        Ok(Self {
            http_addr,
            database_url: env_or_err("DATABASE_URL")?,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            persistence_key: env_or("PERSISTENCE_KEY", "storefront:notifications"),
            watch_content_submissions: env_or_parse("WATCH_CONTENT_SUBMISSIONS", "false")?,
            log_alerts: env_or_parse("LOG_ALERTS", "false")?,
            feed,
            reconnect,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
