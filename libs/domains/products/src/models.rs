use axum_helpers::{
    Filters, Metadata, PageParams, Validator,
    validation::unique,
};
use chrono::{DateTime, Utc};
use domain_categories::Category;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError, ValidationErrors};

pub const MAX_TITLE_BYTES: usize = 1000;
pub const MIN_DESCRIPTION_BYTES: usize = 10;

/// Sort keys accepted by the product listing
pub const SORT_SAFELIST: &[&str] = &[
    "id",
    "title",
    "price",
    "quantity",
    "total_rating",
    "-id",
    "-title",
    "-price",
    "-quantity",
    "-total_rating",
];

/// Product entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: i64,
    #[serde(skip_serializing)]
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    pub title: String,
    /// User who created the product
    pub owner_id: i64,
    pub description: String,
    /// Units in stock, never negative
    pub quantity: i32,
    /// Unit price, always positive
    pub price: f64,
    pub colors: Vec<String>,
    pub images: Vec<String>,
    /// Incremented on every successful update and stock reservation
    pub version: i32,
    pub categories: Vec<Category>,
    /// Average rating, 0 when unrated
    pub total_rating: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ratings: Vec<Rating>,
}

impl Product {
    /// Merge a partial update into this product.
    pub fn apply_update(&mut self, input: UpdateProduct) {
        if let Some(title) = input.title {
            self.title = title;
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        if let Some(quantity) = input.quantity {
            self.quantity = quantity;
        }
        if let Some(price) = input.price {
            self.price = price;
        }
        if let Some(colors) = input.colors {
            self.colors = colors;
        }
        if let Some(images) = input.images {
            self.images = images;
        }
    }

    /// Validate the state that is about to be persisted.
    pub fn validate_state(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(!self.title.is_empty(), "title", "must be provided")
            .check(
                self.title.len() <= MAX_TITLE_BYTES,
                "title",
                "must not be more than 1000 bytes long",
            )
            .check(
                self.description.len() > MIN_DESCRIPTION_BYTES,
                "description",
                "must be more than 10 bytes long",
            )
            .check(self.price > 0.0, "price", "must be a positive value")
            .check(self.quantity >= 0, "quantity", "must not be negative");
        v.finish()
    }
}

/// A customer review of a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromQueryResult)]
pub struct Rating {
    pub id: i64,
    pub product_id: i64,
    pub user_id: i64,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// DTO for creating a product; the owner is the authenticated user
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProduct {
    #[validate(
        length(min = 1, message = "must be provided"),
        custom(function = "title_bytes")
    )]
    pub title: String,
    #[validate(custom(function = "description_bytes"))]
    pub description: String,
    #[validate(range(exclusive_min = 0.0, message = "must be a positive value"))]
    pub price: f64,
    #[validate(range(min = 0, message = "must not be negative"))]
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    /// Category IDs, at least one, no duplicates
    #[validate(
        length(min = 1, message = "must contain at least 1 category"),
        custom(function = "unique_categories")
    )]
    pub categories: Vec<i64>,
}

/// DTO for a partial product update
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProduct {
    #[validate(
        length(min = 1, message = "must be provided"),
        custom(function = "title_bytes")
    )]
    pub title: Option<String>,
    #[validate(custom(function = "description_bytes"))]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub quantity: Option<i32>,
    #[validate(range(exclusive_min = 0.0, message = "must be a positive value"))]
    pub price: Option<f64>,
    pub colors: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

/// DTO for rating a product; the author is the authenticated user
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRating {
    /// No upper bound is enforced
    #[validate(range(min = 0, message = "must not be less than 0"))]
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
}

/// Rating row ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewRating {
    pub product_id: i64,
    pub user_id: i64,
    pub rating: i32,
    pub comment: String,
}

/// Raw listing query string
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Full-text match against the title; empty matches everything
    pub title: Option<String>,
    /// Comma-separated category IDs; a product matches if it has any of them
    pub categories: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    /// One of `id`, `title`, `price`, `quantity`, `total_rating`, optionally prefixed with `-`
    pub sort: Option<String>,
}

impl ProductQuery {
    /// Parse and validate into a listing filter. All violations are reported together.
    pub fn into_filter(self) -> Result<ProductFilter, ValidationErrors> {
        let mut v = Validator::new();

        let categories = match parse_ids(self.categories.as_deref().unwrap_or_default()) {
            Some(ids) => ids,
            None => {
                v.add_error("categories", "must be a comma-separated list of category ids");
                Vec::new()
            }
        };

        let filters = Filters::new(
            PageParams {
                page: self.page,
                page_size: self.page_size,
                sort: self.sort,
            },
            "id",
            SORT_SAFELIST,
        );
        filters.check(&mut v);
        v.finish()?;

        Ok(ProductFilter {
            title: self.title.unwrap_or_default(),
            categories,
            filters,
        })
    }
}

/// Validated listing filter
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFilter {
    pub title: String,
    pub categories: Vec<i64>,
    pub filters: Filters,
}

/// One page of products
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub metadata: Metadata,
}

fn parse_ids(csv: &str) -> Option<Vec<i64>> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().ok().filter(|id| *id > 0))
        .collect()
}

fn title_bytes(title: &str) -> Result<(), ValidationError> {
    if title.len() > MAX_TITLE_BYTES {
        return Err(ValidationError::new("length")
            .with_message("must not be more than 1000 bytes long".into()));
    }
    Ok(())
}

fn description_bytes(description: &str) -> Result<(), ValidationError> {
    if description.len() <= MIN_DESCRIPTION_BYTES {
        return Err(ValidationError::new("length")
            .with_message("must be more than 10 bytes long".into()));
    }
    Ok(())
}

fn unique_categories(ids: &[i64]) -> Result<(), ValidationError> {
    if !unique(ids) {
        return Err(ValidationError::new("unique")
            .with_message("must not contain duplicate values".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_input() -> CreateProduct {
        CreateProduct {
            title: "Trail runner".to_string(),
            description: "Lightweight trail running shoe".to_string(),
            price: 89.5,
            quantity: 3,
            colors: vec!["red".to_string()],
            images: vec![],
            categories: vec![1, 2],
        }
    }

    #[test]
    fn test_valid_create_input() {
        assert!(create_input().validate().is_ok());
    }

    #[test]
    fn test_create_input_reports_every_violation() {
        let input = CreateProduct {
            title: String::new(),
            description: "short".to_string(),
            price: 0.0,
            quantity: -1,
            categories: vec![3, 3],
            ..create_input()
        };

        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        for field in ["title", "description", "price", "quantity", "categories"] {
            assert!(fields.contains_key(field), "missing error for {field}");
        }
    }

    #[test]
    fn test_create_requires_a_category() {
        let input = CreateProduct {
            categories: vec![],
            ..create_input()
        };
        assert!(input.validate().unwrap_err().field_errors().contains_key("categories"));
    }

    #[test]
    fn test_rating_has_no_upper_bound() {
        let high = CreateRating {
            rating: 1_000,
            comment: String::new(),
        };
        assert!(high.validate().is_ok());

        let negative = CreateRating {
            rating: -1,
            comment: String::new(),
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_query_defaults() {
        let filter = ProductQuery::default().into_filter().unwrap();

        assert_eq!(filter.title, "");
        assert!(filter.categories.is_empty());
        assert_eq!(filter.filters.page, 1);
        assert_eq!(filter.filters.page_size, 20);
        assert_eq!(filter.filters.sort_column(), Some("id"));
    }

    #[test]
    fn test_query_parses_category_csv() {
        let filter = ProductQuery {
            categories: Some("3, 1,2".to_string()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();

        assert_eq!(filter.categories, vec![3, 1, 2]);
    }

    #[test]
    fn test_query_rejects_unknown_sort_and_bad_categories_together() {
        let errors = ProductQuery {
            categories: Some("1,shoes".to_string()),
            sort: Some("owner_id".to_string()),
            ..Default::default()
        }
        .into_filter()
        .unwrap_err();

        let fields = errors.field_errors();
        assert!(fields.contains_key("sort"));
        assert!(fields.contains_key("categories"));
    }

    #[test]
    fn test_descending_sort_key() {
        let filter = ProductQuery {
            sort: Some("-total_rating".to_string()),
            ..Default::default()
        }
        .into_filter()
        .unwrap();

        assert_eq!(filter.filters.sort_column(), Some("total_rating"));
        assert_eq!(filter.filters.sort_direction(), axum_helpers::SortDirection::Desc);
    }

    #[test]
    fn test_apply_update_then_validate_state() {
        let mut product = Product {
            id: 1,
            created_at: Utc::now(),
            title: "Trail runner".to_string(),
            owner_id: 1,
            description: "Lightweight trail running shoe".to_string(),
            quantity: 3,
            price: 89.5,
            colors: vec![],
            images: vec![],
            version: 1,
            categories: vec![],
            total_rating: 0.0,
            ratings: vec![],
        };

        product.apply_update(UpdateProduct {
            price: Some(-2.0),
            ..Default::default()
        });

        assert_eq!(product.title, "Trail runner");
        assert!(product.validate_state().unwrap_err().field_errors().contains_key("price"));
    }
}
