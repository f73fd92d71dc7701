use async_trait::async_trait;
use axum_helpers::{Filters, Metadata, SortDirection};
use chrono::Utc;
use domain_products::{
    InMemoryProductRepository, ProductResult, PurchaseHistory, stock::order_total,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{OrderError, OrderResult};
use crate::models::{Order, OrderItem, PlaceOrder};

/// Repository trait for Order persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Reserve stock for every line and record the order, all or nothing.
    ///
    /// The total is the sum of unit price plus quantity over the lines, using
    /// prices read during reservation.
    async fn place(&self, user_id: i64, input: PlaceOrder) -> OrderResult<Order>;

    /// Get an order with its items
    async fn get_by_id(&self, id: i64) -> OrderResult<Option<Order>>;

    /// One page of the orders placed by `user_id`
    async fn list_for_user(&self, user_id: i64, filters: Filters)
    -> OrderResult<(Vec<Order>, Metadata)>;

    /// Persist status, address and total if the stored version still equals
    /// `order.version`; `EditConflict` otherwise.
    async fn update(&self, order: &Order) -> OrderResult<Order>;

    /// Delete an order and its items. Reserved stock is not returned.
    async fn delete(&self, id: i64) -> OrderResult<bool>;
}

/// In-memory implementation of OrderRepository (for development/testing)
///
/// Stock is reserved against the shared in-memory product store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOrderRepository {
    state: Arc<RwLock<Store>>,
    products: InMemoryProductRepository,
}

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    next_item_id: i64,
    orders: BTreeMap<i64, Order>,
}

impl InMemoryOrderRepository {
    pub fn new(products: InMemoryProductRepository) -> Self {
        Self {
            state: Arc::default(),
            products,
        }
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn place(&self, user_id: i64, input: PlaceOrder) -> OrderResult<Order> {
        let reservations = self.products.reserve_all(&input.lines()).await?;

        let mut state = self.state.write().await;
        state.next_id += 1;
        let id = state.next_id;

        let mut items = Vec::with_capacity(input.items.len());
        for line in &input.items {
            state.next_item_id += 1;
            items.push(OrderItem {
                id: state.next_item_id,
                order_id: id,
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }

        let order = Order {
            id,
            user_id,
            ordered_at: Utc::now(),
            status: 0,
            address: input.address,
            total_price: order_total(&reservations),
            version: 1,
            items,
        };
        state.orders.insert(id, order.clone());

        tracing::info!(order_id = id, user_id, "Placed order");
        Ok(order)
    }

    async fn get_by_id(&self, id: i64) -> OrderResult<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        filters: Filters,
    ) -> OrderResult<(Vec<Order>, Metadata)> {
        let state = self.state.read().await;

        let mut matched: Vec<&Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .collect();

        let column = filters.sort_column().unwrap_or("id");
        let direction = filters.sort_direction();
        matched.sort_by(|a, b| {
            let ordering = compare_by(column, a, b);
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            ordering.then(a.id.cmp(&b.id))
        });

        let total = matched.len() as i64;
        let page: Vec<Order> = matched
            .into_iter()
            .skip(filters.offset().max(0) as usize)
            .take(filters.limit().max(0) as usize)
            .cloned()
            .collect();

        Ok((page, Metadata::calculate(total, filters.page, filters.page_size)))
    }

    async fn update(&self, order: &Order) -> OrderResult<Order> {
        let mut state = self.state.write().await;

        let stored = state
            .orders
            .get_mut(&order.id)
            .filter(|stored| stored.version == order.version)
            .ok_or(OrderError::EditConflict(order.id))?;

        stored.status = order.status;
        stored.address = order.address.clone();
        stored.version += 1;

        tracing::info!(order_id = order.id, version = stored.version, "Updated order");
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> OrderResult<bool> {
        let mut state = self.state.write().await;

        if state.orders.remove(&id).is_some() {
            tracing::info!(order_id = id, "Deleted order");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[async_trait]
impl PurchaseHistory for InMemoryOrderRepository {
    async fn has_purchased(&self, user_id: i64, product_id: i64) -> ProductResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .any(|o| o.user_id == user_id && o.contains(product_id)))
    }
}

fn compare_by(column: &str, a: &Order, b: &Order) -> Ordering {
    match column {
        "ordered_at" => a.ordered_at.cmp(&b.ordered_at),
        "total_price" => a.total_price.total_cmp(&b.total_price),
        "status" => a.status.cmp(&b.status),
        _ => a.id.cmp(&b.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderLine, OrderQuery};
    use domain_categories::{CategoryRepository, CreateCategory, InMemoryCategoryRepository};
    use domain_products::{CreateProduct, ProductRepository};

    async fn seeded(stock: &[(f64, i32)]) -> (InMemoryOrderRepository, InMemoryProductRepository, Vec<i64>) {
        let categories = InMemoryCategoryRepository::new();
        let category = categories
            .create(CreateCategory {
                title: "Shoes".to_string(),
                image: String::new(),
            })
            .await
            .unwrap();

        let products = InMemoryProductRepository::new(categories);
        let mut ids = Vec::new();
        for (i, &(price, quantity)) in stock.iter().enumerate() {
            let product = products
                .create(
                    1,
                    CreateProduct {
                        title: format!("Product {i}"),
                        description: "Product used in order tests".to_string(),
                        price,
                        quantity,
                        colors: vec![],
                        images: vec![],
                        categories: vec![category.id],
                    },
                )
                .await
                .unwrap();
            ids.push(product.id);
        }

        (InMemoryOrderRepository::new(products.clone()), products, ids)
    }

    fn place(lines: &[(i64, i32)]) -> PlaceOrder {
        PlaceOrder {
            address: "1 Main St".to_string(),
            items: lines
                .iter()
                .map(|&(product_id, quantity)| OrderLine {
                    product_id,
                    quantity,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_place_drains_stock_and_adds_price_to_quantity() {
        let (orders, products, ids) = seeded(&[(10.0, 3)]).await;

        let order = orders.place(7, place(&[(ids[0], 3)])).await.unwrap();

        assert_eq!(order.total_price, 13.0);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 3);

        let product = products.get_by_id(ids[0]).await.unwrap().unwrap();
        assert_eq!(product.quantity, 0);
        assert_eq!(product.version, 2);
    }

    #[tokio::test]
    async fn test_failed_line_leaves_earlier_lines_untouched() {
        let (orders, products, ids) = seeded(&[(10.0, 5), (4.0, 1)]).await;

        let result = orders.place(7, place(&[(ids[0], 2), (ids[1], 2)])).await;
        assert!(matches!(result, Err(OrderError::OutOfStock(id)) if id == ids[1]));

        let first = products.get_by_id(ids[0]).await.unwrap().unwrap();
        assert_eq!(first.quantity, 5);
        assert_eq!(first.version, 1);
        assert!(!orders.has_purchased(7, ids[0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_product_is_reported() {
        let (orders, _, _) = seeded(&[]).await;
        let result = orders.place(7, place(&[(99, 1)])).await;
        assert!(matches!(result, Err(OrderError::ProductNotFound(99))));
    }

    #[tokio::test]
    async fn test_has_purchased_is_per_user_and_product() {
        let (orders, _, ids) = seeded(&[(10.0, 5), (4.0, 5)]).await;
        orders.place(7, place(&[(ids[0], 1)])).await.unwrap();

        assert!(orders.has_purchased(7, ids[0]).await.unwrap());
        assert!(!orders.has_purchased(7, ids[1]).await.unwrap());
        assert!(!orders.has_purchased(8, ids[0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_only_returns_callers_orders() {
        let (orders, _, ids) = seeded(&[(10.0, 50)]).await;
        for _ in 0..3 {
            orders.place(7, place(&[(ids[0], 1)])).await.unwrap();
        }
        orders.place(8, place(&[(ids[0], 1)])).await.unwrap();

        let filters = OrderQuery {
            page_size: Some(2),
            sort: Some("-id".to_string()),
            ..Default::default()
        }
        .into_filters()
        .unwrap();
        let (page, metadata) = orders.list_for_user(7, filters).await.unwrap();

        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|o| o.user_id == 7));
        assert!(page[0].id > page[1].id);
        assert_eq!(metadata.total_records, 3);
        assert_eq!(metadata.last_page, 2);
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version() {
        let (orders, _, ids) = seeded(&[(10.0, 5)]).await;
        let placed = orders.place(7, place(&[(ids[0], 1)])).await.unwrap();

        let mut first = placed.clone();
        first.status = 1;
        assert_eq!(orders.update(&first).await.unwrap().version, 2);

        let result = orders.update(&placed).await;
        assert!(matches!(result, Err(OrderError::EditConflict(_))));
    }

    #[tokio::test]
    async fn test_delete_keeps_stock_consumed() {
        let (orders, products, ids) = seeded(&[(10.0, 5)]).await;
        let placed = orders.place(7, place(&[(ids[0], 2)])).await.unwrap();

        assert!(orders.delete(placed.id).await.unwrap());
        assert!(!orders.delete(placed.id).await.unwrap());

        let product = products.get_by_id(ids[0]).await.unwrap().unwrap();
        assert_eq!(product.quantity, 3);
    }
}
