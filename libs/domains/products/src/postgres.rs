use async_trait::async_trait;
use axum_helpers::Metadata;
use chrono::{DateTime, Utc};
use database::postgres::{DEFAULT_QUERY_TIMEOUT, bounded, statement};
use domain_categories::Category;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, FromQueryResult, QueryResult, TransactionTrait,
};
use std::collections::HashMap;
use std::time::Duration;

use crate::{
    error::{ProductError, ProductResult},
    models::{CreateProduct, NewRating, Product, ProductFilter, Rating},
    repository::ProductRepository,
};

const PRODUCT_COLUMNS: &str = r#"
    p.id, p.created_at, p.title, p.owner_id, p.description, p.quantity, p.price,
    p.colors, p.images, p.version, COALESCE(r.total_rating, 0)::float8 AS total_rating
"#;

const RATING_AVERAGES: &str = r#"
    LEFT JOIN (
        SELECT product_id, avg(rating) AS total_rating
        FROM ratings
        GROUP BY product_id
    ) r ON r.product_id = p.id
"#;

#[derive(Debug, FromQueryResult)]
struct ProductRow {
    id: i64,
    created_at: DateTime<Utc>,
    title: String,
    owner_id: i64,
    description: String,
    quantity: i32,
    price: f64,
    colors: Vec<String>,
    images: Vec<String>,
    version: i32,
    total_rating: f64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            created_at: row.created_at,
            title: row.title,
            owner_id: row.owner_id,
            description: row.description,
            quantity: row.quantity,
            price: row.price,
            colors: row.colors,
            images: row.images,
            version: row.version,
            categories: Vec::new(),
            total_rating: row.total_rating,
            ratings: Vec::new(),
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct LinkedCategory {
    product_id: i64,
    id: i64,
    title: String,
    image: String,
    version: i32,
}

#[derive(Clone)]
pub struct PgProductRepository {
    db: DatabaseConnection,
    timeout: Duration,
}

impl PgProductRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Override the per-query deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fill `categories` and `ratings` for every product with one query each.
    async fn attach_relations<C: ConnectionTrait>(
        conn: &C,
        products: &mut [Product],
    ) -> ProductResult<()> {
        if products.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = products.iter().map(|p| p.id).collect();

        let links = LinkedCategory::find_by_statement(statement(
            r#"
            SELECT pc.product_id, c.id, c.title, c.image, c.version
            FROM product_category pc
            JOIN categories c ON c.id = pc.category_id
            WHERE pc.product_id = ANY($1)
            ORDER BY c.id
            "#,
            [ids.clone().into()],
        ))
        .all(conn)
        .await?;

        let ratings = Rating::find_by_statement(statement(
            r#"
            SELECT id, product_id, user_id, rating, comment, created_at
            FROM ratings
            WHERE product_id = ANY($1)
            ORDER BY id
            "#,
            [ids.into()],
        ))
        .all(conn)
        .await?;

        let mut categories: HashMap<i64, Vec<Category>> = HashMap::new();
        for link in links {
            categories.entry(link.product_id).or_default().push(Category {
                id: link.id,
                title: link.title,
                image: link.image,
                version: link.version,
            });
        }

        let mut by_product: HashMap<i64, Vec<Rating>> = HashMap::new();
        for rating in ratings {
            by_product.entry(rating.product_id).or_default().push(rating);
        }

        for product in products.iter_mut() {
            product.categories = categories.remove(&product.id).unwrap_or_default();
            product.ratings = by_product.remove(&product.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn create(&self, owner_id: i64, input: CreateProduct) -> ProductResult<Product> {
        bounded(self.timeout, async {
            let txn = self.db.begin().await?;

            let found: Vec<i64> = txn
                .query_all_raw(statement(
                    "SELECT id FROM categories WHERE id = ANY($1)",
                    [input.categories.clone().into()],
                ))
                .await?
                .iter()
                .map(|row| row.try_get::<i64>("", "id"))
                .collect::<Result<_, _>>()?;

            if let Some(&missing) = input.categories.iter().find(|id| !found.contains(id)) {
                return Err(ProductError::CategoryNotFound(missing));
            }

            let row = ProductRow::find_by_statement(statement(
                r#"
                INSERT INTO products (title, owner_id, description, quantity, price, colors, images)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, created_at, title, owner_id, description, quantity, price,
                          colors, images, version, 0::float8 AS total_rating
                "#,
                [
                    input.title.into(),
                    owner_id.into(),
                    input.description.into(),
                    input.quantity.into(),
                    input.price.into(),
                    input.colors.into(),
                    input.images.into(),
                ],
            ))
            .one(&txn)
            .await?
            .ok_or_else(|| ProductError::Internal("insert returned no row".to_string()))?;

            txn.execute_raw(statement(
                r#"
                INSERT INTO product_category (product_id, category_id)
                SELECT $1, unnest($2::bigint[])
                "#,
                [row.id.into(), input.categories.into()],
            ))
            .await?;

            let mut products = vec![Product::from(row)];
            Self::attach_relations(&txn, &mut products).await?;
            txn.commit().await?;

            let product = products.remove(0);
            tracing::info!(product_id = product.id, owner_id, "Created product");
            Ok::<_, ProductError>(product)
        })
        .await
    }

    async fn get_by_id(&self, id: i64) -> ProductResult<Option<Product>> {
        bounded(self.timeout, async {
            let row = ProductRow::find_by_statement(statement(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products p {RATING_AVERAGES} WHERE p.id = $1"),
                [id.into()],
            ))
            .one(&self.db)
            .await?;

            let Some(row) = row else {
                return Ok(None);
            };

            let mut products = vec![Product::from(row)];
            Self::attach_relations(&self.db, &mut products).await?;
            Ok::<_, ProductError>(products.pop())
        })
        .await
    }

    async fn list(&self, filter: ProductFilter) -> ProductResult<(Vec<Product>, Metadata)> {
        let column = filter.filters.sort_column().unwrap_or("id");
        let direction = filter.filters.sort_direction().as_sql();

        // Sort column and direction come from the allow-list, never from raw input.
        let sql = format!(
            r#"
            SELECT count(*) OVER() AS total_records, {PRODUCT_COLUMNS}
            FROM products p
            {RATING_AVERAGES}
            WHERE (to_tsvector('simple', p.title) @@ plainto_tsquery('simple', $1) OR $1 = '')
              AND (cardinality($2::bigint[]) = 0 OR EXISTS (
                    SELECT 1 FROM product_category pc
                    WHERE pc.product_id = p.id AND pc.category_id = ANY($2)
              ))
            ORDER BY {column} {direction}, id ASC
            LIMIT $3 OFFSET $4
            "#
        );

        let stmt = statement(
            &sql,
            [
                filter.title.into(),
                filter.categories.into(),
                filter.filters.limit().into(),
                filter.filters.offset().into(),
            ],
        );

        bounded(self.timeout, async {
            let rows: Vec<QueryResult> = self.db.query_all_raw(stmt).await?;

            let mut total_records = 0;
            let mut products = Vec::with_capacity(rows.len());
            for row in &rows {
                total_records = row.try_get::<i64>("", "total_records")?;
                products.push(Product::from(ProductRow::from_query_result(row, "")?));
            }

            Self::attach_relations(&self.db, &mut products).await?;

            let metadata = Metadata::calculate(
                total_records,
                filter.filters.page,
                filter.filters.page_size,
            );
            Ok::<_, ProductError>((products, metadata))
        })
        .await
    }

    async fn update(&self, product: &Product) -> ProductResult<Product> {
        let stmt = statement(
            r#"
            UPDATE products
            SET title = $1, description = $2, quantity = $3, price = $4,
                colors = $5, images = $6, version = version + 1
            WHERE id = $7 AND version = $8
            RETURNING version
            "#,
            [
                product.title.clone().into(),
                product.description.clone().into(),
                product.quantity.into(),
                product.price.into(),
                product.colors.clone().into(),
                product.images.clone().into(),
                product.id.into(),
                product.version.into(),
            ],
        );

        let row = bounded(self.timeout, self.db.query_one_raw(stmt))
            .await?
            .ok_or(ProductError::EditConflict(product.id))?;

        let updated = Product {
            version: row.try_get::<i32>("", "version")?,
            ..product.clone()
        };

        tracing::info!(product_id = product.id, version = updated.version, "Updated product");
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> ProductResult<bool> {
        let stmt = statement("DELETE FROM products WHERE id = $1", [id.into()]);
        let result = bounded(self.timeout, self.db.execute_raw(stmt)).await?;

        if result.rows_affected() > 0 {
            tracing::info!(product_id = id, "Deleted product");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn insert_rating(&self, rating: NewRating) -> ProductResult<Rating> {
        let stmt = statement(
            r#"
            INSERT INTO ratings (product_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id, product_id, user_id, rating, comment, created_at
            "#,
            [
                rating.product_id.into(),
                rating.user_id.into(),
                rating.rating.into(),
                rating.comment.into(),
            ],
        );

        let stored = bounded(self.timeout, Rating::find_by_statement(stmt).one(&self.db))
            .await?
            .ok_or_else(|| ProductError::Internal("insert returned no row".to_string()))?;

        tracing::info!(
            product_id = stored.product_id,
            user_id = stored.user_id,
            rating = stored.rating,
            "Rated product"
        );
        Ok(stored)
    }
}
