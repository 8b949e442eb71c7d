use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub pwd_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Categories are global, not per-user; handlers only ever read them.
#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    pub barcode: Option<String>,
    pub category_id: Option<i64>,
    pub user_id: i64,
    pub created_at: String,
    pub updated_at: String,
}
