//! # Order Model
//!
//! A confirmed purchase of a filtered slice of the directory dataset.
//!
//! ## Database Schema
//!
//! Maps to the `orders` table:
//! ```sql
//! CREATE TABLE orders (
//!   order_id UUID PRIMARY KEY,
//!   user_id UUID NOT NULL REFERENCES users (user_id),
//!   email TEXT NOT NULL,
//!   user_name TEXT,
//!   filters JSONB NOT NULL,
//!   total_count BIGINT NOT NULL,
//!   add_ons TEXT[] NOT NULL DEFAULT '{}',
//!   price_cents BIGINT NOT NULL,
//!   payment_ref TEXT NOT NULL,
//!   status TEXT NOT NULL DEFAULT 'processing',
//!   error TEXT,
//!   -- timestamps
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::state_machine::OrderStatus;

/// A purchased order as persisted by the marketplace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub user_name: Option<String>,
    #[sqlx(json)]
    pub filters: FilterSpec,
    pub total_count: i64,
    pub add_ons: Vec<String>,
    pub price_cents: i64,
    pub payment_ref: String,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order fields supplied at purchase confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub email: String,
    pub user_name: Option<String>,
    pub filters: FilterSpec,
    pub total_count: i64,
    pub add_ons: Vec<String>,
    pub price_cents: i64,
    pub payment_ref: String,
}

/// The customer's category and location selection.
///
/// Subcategory entries are written `category:subcategory` and sub-subcategory entries
/// `category:subcategory:label`. Immutable once attached to an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSpec {
    pub categories: Vec<String>,
    pub subcategories: Vec<String>,
    pub sub_subcategories: Vec<String>,
    pub country: Option<LocationValue>,
    pub state: Option<LocationValue>,
    pub city: Option<LocationValue>,
}

/// A location choice as submitted by the storefront (display label plus stored value)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationValue {
    #[serde(default)]
    pub label: Option<String>,
    pub value: String,
}

impl LocationValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            label: None,
            value: value.into(),
        }
    }
}

impl Order {
    /// Record count the order was priced against
    pub fn promised_count(&self) -> u64 {
        self.total_count.max(0) as u64
    }

    /// Add-on columns outside the base schema defer fulfillment to staff
    pub fn requires_manual_delivery(&self) -> bool {
        !self.add_ons.is_empty()
    }

    pub fn greeting_name(&self) -> &str {
        self.user_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Customer")
    }

    /// Price formatted for customer-facing messages
    pub fn price_display(&self) -> String {
        format!("${}.{:02}", self.price_cents / 100, self.price_cents % 100)
    }

    pub fn add_ons_display(&self) -> String {
        if self.add_ons.is_empty() {
            "None".to_string()
        } else {
            self.add_ons.join(", ")
        }
    }

    /// Materialize a new order in `processing`
    pub fn from_new(new_order: NewOrder) -> Self {
        let now = Utc::now();
        Self {
            order_id: Uuid::new_v4(),
            user_id: new_order.user_id,
            email: new_order.email,
            user_name: new_order.user_name,
            filters: new_order.filters,
            total_count: new_order.total_count,
            add_ons: new_order.add_ons,
            price_cents: new_order.price_cents,
            payment_ref: new_order.payment_ref,
            status: OrderStatus::Processing,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order::from_new(NewOrder {
            user_id: Uuid::new_v4(),
            email: "buyer@example.com".to_string(),
            user_name: None,
            filters: FilterSpec::default(),
            total_count: 250,
            add_ons: vec![],
            price_cents: 250,
            payment_ref: "pi_123".to_string(),
        })
    }

    #[test]
    fn test_new_order_starts_processing() {
        let order = sample_order();
        assert_eq!(order.status, OrderStatus::Processing);
        assert!(order.error.is_none());
        assert_eq!(order.promised_count(), 250);
    }

    #[test]
    fn test_display_helpers() {
        let mut order = sample_order();
        assert_eq!(order.greeting_name(), "Customer");
        assert_eq!(order.price_display(), "$2.50");
        assert_eq!(order.add_ons_display(), "None");

        order.add_ons = vec!["email".to_string(), "website".to_string()];
        assert_eq!(order.add_ons_display(), "email, website");
        assert!(order.requires_manual_delivery());
    }

    #[test]
    fn test_filter_spec_accepts_storefront_json() {
        let json = serde_json::json!({
            "categories": ["Restaurants"],
            "subcategories": ["Restaurants:Pizza"],
            "subSubcategories": ["Restaurants:Pizza:Delivery"],
            "country": { "label": "USA", "value": "USA" },
            "state": null
        });
        let spec: FilterSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.sub_subcategories, vec!["Restaurants:Pizza:Delivery"]);
        assert_eq!(spec.country.unwrap().value, "USA");
        assert!(spec.state.is_none());
        assert!(spec.city.is_none());
    }
}
