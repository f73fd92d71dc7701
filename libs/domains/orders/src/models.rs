use axum_helpers::{Filters, Metadata, PageParams, Validator};
use chrono::{DateTime, Utc};
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationErrors};

/// Sort keys accepted by the order listing
pub const SORT_SAFELIST: &[&str] = &[
    "id",
    "ordered_at",
    "total_price",
    "status",
    "-id",
    "-ordered_at",
    "-total_price",
    "-status",
];

/// Order header with its line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub ordered_at: DateTime<Utc>,
    /// Integer status code, 0 when placed
    pub status: i32,
    pub address: String,
    /// Computed from product prices when the order was placed
    pub total_price: f64,
    pub version: i32,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn apply_update(&mut self, input: UpdateOrder) {
        if let Some(status) = input.status {
            self.status = status;
        }
        if let Some(address) = input.address {
            self.address = address;
        }
    }

    /// Validate the state that is about to be persisted.
    pub fn validate_state(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(!self.address.is_empty(), "address", "must be provided")
            .check(self.status >= 0, "status", "must not be negative");
        v.finish()
    }

    pub fn contains(&self, product_id: i64) -> bool {
        self.items.iter().any(|item| item.product_id == product_id)
    }
}

/// One product line of an order; immutable once placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromQueryResult)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
}

/// Requested product line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderLine {
    #[validate(range(min = 1, message = "must be a valid product id"))]
    pub product_id: i64,
    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub quantity: i32,
}

/// DTO for placing an order; the customer is the authenticated user
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PlaceOrder {
    #[validate(length(min = 1, message = "must be provided"))]
    pub address: String,
    #[validate(length(min = 1, message = "must contain at least 1 item"), nested)]
    pub items: Vec<OrderLine>,
}

impl PlaceOrder {
    /// `(product_id, quantity)` pairs in request order
    pub fn lines(&self) -> Vec<(i64, i32)> {
        self.items
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect()
    }
}

/// DTO for an order update; the total stays as computed at placement
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateOrder {
    #[validate(range(min = 0, message = "must not be negative"))]
    pub status: Option<i32>,
    #[validate(length(min = 1, message = "must be provided"))]
    pub address: Option<String>,
}

/// Raw listing query string
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// One of `id`, `ordered_at`, `total_price`, `status`, optionally prefixed with `-`
    pub sort: Option<String>,
}

impl OrderQuery {
    pub fn into_filters(self) -> Result<Filters, ValidationErrors> {
        Filters::parse(
            PageParams {
                page: self.page,
                page_size: self.page_size,
                sort: self.sort,
            },
            "id",
            SORT_SAFELIST,
        )
    }
}

/// One page of the caller's orders
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order {
        Order {
            id: 1,
            user_id: 2,
            ordered_at: Utc::now(),
            status: 0,
            address: "1 Main St".to_string(),
            total_price: 13.0,
            version: 1,
            items: vec![OrderItem {
                id: 1,
                order_id: 1,
                product_id: 5,
                quantity: 3,
            }],
        }
    }

    #[test]
    fn test_place_order_requires_items_and_address() {
        let input = PlaceOrder {
            address: String::new(),
            items: vec![],
        };
        let errors = input.validate().unwrap_err();
        let fields = errors.errors();
        assert!(fields.contains_key("address"));
        assert!(fields.contains_key("items"));
    }

    #[test]
    fn test_place_order_checks_each_line() {
        let input = PlaceOrder {
            address: "1 Main St".to_string(),
            items: vec![
                OrderLine {
                    product_id: 5,
                    quantity: 1,
                },
                OrderLine {
                    product_id: 6,
                    quantity: 0,
                },
            ],
        };
        let errors = input.validate().unwrap_err();
        let messages = axum_helpers::validation::field_messages(&errors);
        assert_eq!(
            messages.get("items[1].quantity").map(String::as_str),
            Some("must be greater than zero")
        );
    }

    #[test]
    fn test_apply_update_then_validate_state() {
        let mut o = order();
        o.apply_update(UpdateOrder {
            status: Some(2),
            ..Default::default()
        });
        assert_eq!(o.status, 2);
        assert_eq!(o.address, "1 Main St");
        assert!(o.validate_state().is_ok());

        o.address.clear();
        let errors = o.validate_state().unwrap_err();
        assert!(errors.field_errors().contains_key("address"));
    }

    #[test]
    fn test_order_query_rejects_product_sort_keys() {
        let query = OrderQuery {
            sort: Some("price".to_string()),
            ..Default::default()
        };
        assert!(query.into_filters().is_err());

        let filters = OrderQuery {
            sort: Some("-ordered_at".to_string()),
            ..Default::default()
        }
        .into_filters()
        .unwrap();
        assert_eq!(filters.sort_column(), Some("ordered_at"));
    }

    #[test]
    fn test_contains() {
        assert!(order().contains(5));
        assert!(!order().contains(6));
    }
}
