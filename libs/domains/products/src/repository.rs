use async_trait::async_trait;
use axum_helpers::{Metadata, SortDirection};
use chrono::Utc;
use domain_categories::InMemoryCategoryRepository;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ProductError, ProductResult};
use crate::models::{CreateProduct, NewRating, Product, ProductFilter, Rating};
use crate::stock::Reservation;

/// Repository trait for Product persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Create a product and link it to its categories
    async fn create(&self, owner_id: i64, input: CreateProduct) -> ProductResult<Product>;

    /// Get a product with its categories, ratings and average rating
    async fn get_by_id(&self, id: i64) -> ProductResult<Option<Product>>;

    /// One page of products matching `filter`, with paging metadata
    async fn list(&self, filter: ProductFilter) -> ProductResult<(Vec<Product>, Metadata)>;

    /// Persist `product` if its stored version still equals `product.version`.
    ///
    /// Returns the product with the incremented version, or `EditConflict`.
    async fn update(&self, product: &Product) -> ProductResult<Product>;

    /// Delete a product by ID
    async fn delete(&self, id: i64) -> ProductResult<bool>;

    /// Store a rating
    async fn insert_rating(&self, rating: NewRating) -> ProductResult<Rating>;
}

/// Order history lookup backing the verified-purchase gate on ratings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PurchaseHistory: Send + Sync {
    /// True when some order placed by `user_id` contains `product_id`
    async fn has_purchased(&self, user_id: i64, product_id: i64) -> ProductResult<bool>;
}

#[async_trait]
impl<T: PurchaseHistory + ?Sized> PurchaseHistory for Arc<T> {
    async fn has_purchased(&self, user_id: i64, product_id: i64) -> ProductResult<bool> {
        (**self).has_purchased(user_id, product_id).await
    }
}

/// In-memory implementation of ProductRepository (for development/testing)
///
/// Category existence is checked against the shared in-memory category store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryProductRepository {
    state: Arc<RwLock<Store>>,
    categories: InMemoryCategoryRepository,
}

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    next_rating_id: i64,
    products: BTreeMap<i64, Product>,
}

impl InMemoryProductRepository {
    pub fn new(categories: InMemoryCategoryRepository) -> Self {
        Self {
            state: Arc::default(),
            categories,
        }
    }

    /// Reserve stock for every `(product_id, quantity)` line, or for none.
    ///
    /// Lines are applied in order against a staged copy, so repeated product
    /// IDs draw down the same stock. Nothing is written unless every line fits.
    pub async fn reserve_all(&self, lines: &[(i64, i32)]) -> ProductResult<Vec<Reservation>> {
        let mut state = self.state.write().await;
        let mut staged: HashMap<i64, (i32, i32)> = HashMap::new();
        let mut reservations = Vec::with_capacity(lines.len());

        for &(product_id, quantity) in lines {
            let product = state
                .products
                .get(&product_id)
                .ok_or(ProductError::NotFound(product_id))?;
            let (stock, version) = staged
                .entry(product_id)
                .or_insert((product.quantity, product.version));

            if *stock < quantity {
                return Err(ProductError::OutOfStock(product_id));
            }
            *stock -= quantity;
            *version += 1;

            reservations.push(Reservation {
                product_id,
                quantity,
                unit_price: product.price,
                version: *version,
            });
        }

        for (product_id, (stock, version)) in staged {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.quantity = stock;
                product.version = version;
            }
        }

        Ok(reservations)
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn create(&self, owner_id: i64, input: CreateProduct) -> ProductResult<Product> {
        if let Some(&missing) = self.categories.missing(&input.categories).await.first() {
            return Err(ProductError::CategoryNotFound(missing));
        }
        let categories = self.categories.get_many(&input.categories).await;

        let mut state = self.state.write().await;
        state.next_id += 1;

        let product = Product {
            id: state.next_id,
            created_at: Utc::now(),
            title: input.title,
            owner_id,
            description: input.description,
            quantity: input.quantity,
            price: input.price,
            colors: input.colors,
            images: input.images,
            version: 1,
            categories,
            total_rating: 0.0,
            ratings: Vec::new(),
        };
        state.products.insert(product.id, product.clone());

        tracing::info!(product_id = product.id, "Created product");
        Ok(product)
    }

    async fn get_by_id(&self, id: i64) -> ProductResult<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.get(&id).cloned())
    }

    async fn list(&self, filter: ProductFilter) -> ProductResult<(Vec<Product>, Metadata)> {
        let state = self.state.read().await;
        let terms: Vec<String> = filter
            .title
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let mut matched: Vec<&Product> = state
            .products
            .values()
            .filter(|p| {
                let words: Vec<String> = p.title.split_whitespace().map(str::to_lowercase).collect();
                terms.iter().all(|t| words.contains(t))
            })
            .filter(|p| {
                filter.categories.is_empty()
                    || p.categories.iter().any(|c| filter.categories.contains(&c.id))
            })
            .collect();

        let column = filter.filters.sort_column().unwrap_or("id");
        let direction = filter.filters.sort_direction();
        matched.sort_by(|a, b| {
            let ordering = compare_by(column, a, b);
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            ordering.then(a.id.cmp(&b.id))
        });

        let total = matched.len() as i64;
        let page: Vec<Product> = matched
            .into_iter()
            .skip(filter.filters.offset().max(0) as usize)
            .take(filter.filters.limit().max(0) as usize)
            .cloned()
            .collect();

        let metadata = Metadata::calculate(total, filter.filters.page, filter.filters.page_size);
        Ok((page, metadata))
    }

    async fn update(&self, product: &Product) -> ProductResult<Product> {
        let mut state = self.state.write().await;

        let stored = state
            .products
            .get_mut(&product.id)
            .filter(|stored| stored.version == product.version)
            .ok_or(ProductError::EditConflict(product.id))?;

        stored.title = product.title.clone();
        stored.description = product.description.clone();
        stored.quantity = product.quantity;
        stored.price = product.price;
        stored.colors = product.colors.clone();
        stored.images = product.images.clone();
        stored.version += 1;

        tracing::info!(product_id = product.id, version = stored.version, "Updated product");
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> ProductResult<bool> {
        let mut state = self.state.write().await;

        if state.products.remove(&id).is_some() {
            tracing::info!(product_id = id, "Deleted product");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn insert_rating(&self, rating: NewRating) -> ProductResult<Rating> {
        let mut state = self.state.write().await;
        state.next_rating_id += 1;
        let id = state.next_rating_id;

        let product = state
            .products
            .get_mut(&rating.product_id)
            .ok_or(ProductError::NotFound(rating.product_id))?;

        let stored = Rating {
            id,
            product_id: rating.product_id,
            user_id: rating.user_id,
            rating: rating.rating,
            comment: rating.comment,
            created_at: Utc::now(),
        };
        product.ratings.push(stored.clone());
        product.total_rating = product.ratings.iter().map(|r| f64::from(r.rating)).sum::<f64>()
            / product.ratings.len() as f64;

        Ok(stored)
    }
}

fn compare_by(column: &str, a: &Product, b: &Product) -> Ordering {
    match column {
        "title" => a.title.cmp(&b.title),
        "price" => a.price.total_cmp(&b.price),
        "quantity" => a.quantity.cmp(&b.quantity),
        "total_rating" => a.total_rating.total_cmp(&b.total_rating),
        _ => a.id.cmp(&b.id),
    }
}
