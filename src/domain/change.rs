use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// A monitored source in the system of record. Each source is one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Accounts,
    Orders,
    Inventory,
    Content,
}

impl Source {
    pub fn table(&self) -> &'static str {
        match self {
            Source::Accounts => "profiles",
            Source::Orders => "orders",
            Source::Inventory => "products",
            Source::Content => "content_submissions",
        }
    }

    /// NOTIFY channel the change-feed triggers publish on.
    pub fn channel(&self) -> &'static str {
        match self {
            Source::Accounts => "storefront_accounts",
            Source::Orders => "storefront_orders",
            Source::Inventory => "storefront_inventory",
            Source::Content => "storefront_content",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.channel())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

/// Raw change record as published by the system of record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub operation: Operation,
    pub table: String,
    pub record: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: Uuid,
    pub total: f64,
    pub status: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: Uuid,
    pub name: String,
    pub stock: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: Uuid,
    #[serde(default)]
    pub author_name: Option<String>,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
