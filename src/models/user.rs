use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Marketplace account; only the contact fields matter to fulfillment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
}
