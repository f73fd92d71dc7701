//! Integration tests for Orders domain against PostgreSQL (testcontainers)
//!
//! Placement, concurrency and the rating eligibility check run against a real
//! database so that row versions and check constraints are exercised.

use domain_categories::{CategoryRepository, CreateCategory, PgCategoryRepository};
use domain_orders::*;
use domain_products::{
    CreateProduct, CreateRating, PgProductRepository, ProductError, ProductRepository,
    ProductService, PurchaseHistory,
};
use test_utils::{TestDataBuilder, TestDatabase};

struct Shop {
    db: TestDatabase,
    products: PgProductRepository,
    orders: PgOrderRepository,
    customer: i64,
    category: i64,
}

impl Shop {
    async fn new(test_name: &str) -> Self {
        let db = TestDatabase::new().await;
        let builder = TestDataBuilder::from_test_name(test_name);
        let customer = db.create_test_user(&builder.email("customer")).await;
        let category = PgCategoryRepository::new(db.connection())
            .create(CreateCategory {
                title: "Shoes".to_string(),
                image: String::new(),
            })
            .await
            .unwrap()
            .id;

        Self {
            products: PgProductRepository::new(db.connection()),
            orders: PgOrderRepository::new(db.connection()),
            db,
            customer,
            category,
        }
    }

    async fn product(&self, price: f64, quantity: i32) -> i64 {
        self.products
            .create(
                self.customer,
                CreateProduct {
                    title: "Trail runner".to_string(),
                    description: "Product created for order integration tests".to_string(),
                    price,
                    quantity,
                    colors: vec![],
                    images: vec![],
                    categories: vec![self.category],
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn stock(&self, product_id: i64) -> (i32, i32) {
        let product = self.products.get_by_id(product_id).await.unwrap().unwrap();
        (product.quantity, product.version)
    }
}

fn order(lines: &[(i64, i32)]) -> PlaceOrder {
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
async fn test_order_for_entire_stock_succeeds() {
    let shop = Shop::new("order_entire_stock").await;
    let product_id = shop.product(10.0, 3).await;

    let placed = shop
        .orders
        .place(shop.customer, order(&[(product_id, 3)]))
        .await
        .unwrap();

    assert_eq!(placed.total_price, 13.0);
    assert_eq!(placed.status, 0);
    assert_eq!(placed.version, 1);
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].product_id, product_id);
    assert_eq!(placed.items[0].quantity, 3);

    assert_eq!(shop.stock(product_id).await, (0, 2));

    let fetched = shop.orders.get_by_id(placed.id).await.unwrap().unwrap();
    assert_eq!(fetched, placed);
}

#[tokio::test]
async fn test_order_beyond_stock_is_out_of_stock() {
    let shop = Shop::new("order_beyond_stock").await;
    let product_id = shop.product(10.0, 2).await;

    let result = shop
        .orders
        .place(shop.customer, order(&[(product_id, 3)]))
        .await;

    assert!(
        matches!(result, Err(OrderError::OutOfStock(id)) if id == product_id),
        "expected OutOfStock, got {:?}",
        result
    );
    assert_eq!(shop.stock(product_id).await, (2, 1));
}

#[tokio::test]
async fn test_failed_line_rolls_back_earlier_reservations() {
    let shop = Shop::new("order_rollback").await;
    let plenty = shop.product(10.0, 5).await;
    let scarce = shop.product(4.0, 1).await;

    let result = shop
        .orders
        .place(shop.customer, order(&[(plenty, 2), (scarce, 2)]))
        .await;
    assert!(matches!(result, Err(OrderError::OutOfStock(_))));

    let result = shop
        .orders
        .place(shop.customer, order(&[(plenty, 2), (424242, 1)]))
        .await;
    assert!(matches!(result, Err(OrderError::ProductNotFound(424242))));

    assert_eq!(shop.stock(plenty).await, (5, 1));
    assert_eq!(shop.stock(scarce).await, (1, 1));

    let (orders, _) = shop
        .orders
        .list_for_user(shop.customer, OrderQuery::default().into_filters().unwrap())
        .await
        .unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_concurrent_orders_for_last_unit() {
    let shop = Shop::new("order_last_unit").await;
    let product_id = shop.product(10.0, 1).await;
    let rival = shop.db.create_test_user("rival@example.com").await;

    let first = shop.orders.clone();
    let second = shop.orders.clone();
    let (a, b) = tokio::join!(
        first.place(shop.customer, order(&[(product_id, 1)])),
        second.place(rival, order(&[(product_id, 1)])),
    );

    let results = [a, b];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one placement wins: {:?}", results);

    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(err, OrderError::EditConflict(_) | OrderError::OutOfStock(_)),
                "loser must see a conflict, got {:?}",
                err
            );
        }
    }

    assert_eq!(shop.stock(product_id).await.0, 0);
}

#[tokio::test]
async fn test_rating_requires_an_order_containing_the_product() {
    let shop = Shop::new("order_review_gate").await;
    let ordered = shop.product(10.0, 5).await;
    let not_ordered = shop.product(10.0, 5).await;

    let service = ProductService::new(shop.products.clone(), shop.orders.clone());
    let rating = || CreateRating {
        rating: 4,
        comment: "fits well".to_string(),
    };

    let result = service.rate_product(shop.customer, ordered, rating()).await;
    assert!(matches!(result, Err(ProductError::NotPermitted { .. })));

    shop.orders
        .place(shop.customer, order(&[(ordered, 1)]))
        .await
        .unwrap();

    assert!(shop.orders.has_purchased(shop.customer, ordered).await.unwrap());
    assert!(!shop.orders.has_purchased(shop.customer, not_ordered).await.unwrap());

    let stored = service
        .rate_product(shop.customer, ordered, rating())
        .await
        .unwrap();
    assert_eq!(stored.rating, 4);

    let result = service.rate_product(shop.customer, not_ordered, rating()).await;
    assert!(matches!(result, Err(ProductError::NotPermitted { .. })));
}

#[tokio::test]
async fn test_list_update_and_delete() {
    let shop = Shop::new("order_list_update_delete").await;
    let product_id = shop.product(10.0, 50).await;

    let mut placed = Vec::new();
    for quantity in 1..=3 {
        placed.push(
            shop.orders
                .place(shop.customer, order(&[(product_id, quantity)]))
                .await
                .unwrap(),
        );
    }

    let filters = OrderQuery {
        page_size: Some(2),
        sort: Some("-total_price".to_string()),
        ..Default::default()
    }
    .into_filters()
    .unwrap();
    let (page, metadata) = shop.orders.list_for_user(shop.customer, filters).await.unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page[0].total_price, 13.0);
    assert_eq!(metadata.total_records, 3);
    assert_eq!(metadata.last_page, 2);

    let mut changed = placed[0].clone();
    changed.status = 2;
    changed.total_price = 0.01;
    let updated = shop.orders.update(&changed).await.unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.total_price, 11.0);

    let stored = shop.orders.get_by_id(placed[0].id).await.unwrap().unwrap();
    assert_eq!(stored.status, 2);
    assert_eq!(stored.total_price, 11.0);

    let result = shop.orders.update(&placed[0]).await;
    assert!(matches!(result, Err(OrderError::EditConflict(_))));

    assert!(shop.orders.delete(placed[1].id).await.unwrap());
    assert!(shop.orders.get_by_id(placed[1].id).await.unwrap().is_none());
    assert_eq!(shop.stock(product_id).await.0, 44);
}
