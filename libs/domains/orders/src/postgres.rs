use async_trait::async_trait;
use axum_helpers::{Filters, Metadata};
use chrono::{DateTime, Utc};
use database::postgres::{DEFAULT_QUERY_TIMEOUT, bounded, statement};
use domain_products::{ProductResult, PurchaseHistory, stock};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, FromQueryResult, QueryResult, TransactionTrait,
};
use std::collections::HashMap;
use std::time::Duration;

use crate::{
    error::{OrderError, OrderResult},
    models::{Order, OrderItem, PlaceOrder},
    repository::OrderRepository,
};

const ORDER_COLUMNS: &str = "id, user_id, ordered_at, status, address, total_price, version";

#[derive(Debug, FromQueryResult)]
struct OrderRow {
    id: i64,
    user_id: i64,
    ordered_at: DateTime<Utc>,
    status: i32,
    address: String,
    total_price: f64,
    version: i32,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            user_id: row.user_id,
            ordered_at: row.ordered_at,
            status: row.status,
            address: row.address,
            total_price: row.total_price,
            version: row.version,
            items: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct PgOrderRepository {
    db: DatabaseConnection,
    timeout: Duration,
}

impl PgOrderRepository {
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

    async fn attach_items<C: ConnectionTrait>(conn: &C, orders: &mut [Order]) -> OrderResult<()> {
        if orders.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();

        let items = OrderItem::find_by_statement(statement(
            r#"
            SELECT id, order_id, product_id, quantity
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id
            "#,
            [ids.into()],
        ))
        .all(conn)
        .await?;

        let mut by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }
        for order in orders.iter_mut() {
            order.items = by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn place(&self, user_id: i64, input: PlaceOrder) -> OrderResult<Order> {
        // Dropping the transaction on any early return rolls back every
        // reservation made so far.
        bounded(self.timeout, async {
            let txn = self.db.begin().await?;

            let mut reservations = Vec::with_capacity(input.items.len());
            for line in &input.items {
                reservations.push(stock::reserve(&txn, line.product_id, line.quantity).await?);
            }
            let total_price = stock::order_total(&reservations);

            let row = OrderRow::find_by_statement(statement(
                &format!(
                    "INSERT INTO orders (user_id, address, total_price) VALUES ($1, $2, $3) RETURNING {ORDER_COLUMNS}"
                ),
                [user_id.into(), input.address.clone().into(), total_price.into()],
            ))
            .one(&txn)
            .await?
            .ok_or_else(|| OrderError::Internal("insert returned no row".to_string()))?;

            let (product_ids, quantities): (Vec<i64>, Vec<i32>) = input
                .items
                .iter()
                .map(|line| (line.product_id, line.quantity))
                .unzip();

            txn.execute_raw(statement(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity)
                SELECT $1, item.product_id, item.quantity
                FROM unnest($2::bigint[], $3::int[]) AS item(product_id, quantity)
                "#,
                [row.id.into(), product_ids.into(), quantities.into()],
            ))
            .await?;

            let mut orders = vec![Order::from(row)];
            Self::attach_items(&txn, &mut orders).await?;
            txn.commit().await?;

            let order = orders.remove(0);
            tracing::info!(
                order_id = order.id,
                user_id,
                total_price = order.total_price,
                "Placed order"
            );
            Ok::<_, OrderError>(order)
        })
        .await
    }

    async fn get_by_id(&self, id: i64) -> OrderResult<Option<Order>> {
        bounded(self.timeout, async {
            let row = OrderRow::find_by_statement(statement(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"),
                [id.into()],
            ))
            .one(&self.db)
            .await?;

            let Some(row) = row else {
                return Ok(None);
            };

            let mut orders = vec![Order::from(row)];
            Self::attach_items(&self.db, &mut orders).await?;
            Ok::<_, OrderError>(orders.pop())
        })
        .await
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        filters: Filters,
    ) -> OrderResult<(Vec<Order>, Metadata)> {
        let column = filters.sort_column().unwrap_or("id");
        let direction = filters.sort_direction().as_sql();

        // Sort column and direction come from the allow-list, never from raw input.
        let sql = format!(
            r#"
            SELECT count(*) OVER() AS total_records, {ORDER_COLUMNS}
            FROM orders
            WHERE user_id = $1
            ORDER BY {column} {direction}, id ASC
            LIMIT $2 OFFSET $3
            "#
        );
        let stmt = statement(
            &sql,
            [user_id.into(), filters.limit().into(), filters.offset().into()],
        );

        bounded(self.timeout, async {
            let rows: Vec<QueryResult> = self.db.query_all_raw(stmt).await?;

            let mut total_records = 0;
            let mut orders = Vec::with_capacity(rows.len());
            for row in &rows {
                total_records = row.try_get::<i64>("", "total_records")?;
                orders.push(Order::from(OrderRow::from_query_result(row, "")?));
            }

            Self::attach_items(&self.db, &mut orders).await?;

            let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);
            Ok::<_, OrderError>((orders, metadata))
        })
        .await
    }

    async fn update(&self, order: &Order) -> OrderResult<Order> {
        let stmt = statement(
            r#"
            UPDATE orders
            SET status = $1, address = $2, version = version + 1
            WHERE id = $3 AND version = $4
            RETURNING version, total_price
            "#,
            [
                order.status.into(),
                order.address.clone().into(),
                order.id.into(),
                order.version.into(),
            ],
        );

        let row = bounded(self.timeout, self.db.query_one_raw(stmt))
            .await?
            .ok_or(OrderError::EditConflict(order.id))?;

        let updated = Order {
            version: row.try_get::<i32>("", "version")?,
            total_price: row.try_get::<f64>("", "total_price")?,
            ..order.clone()
        };

        tracing::info!(order_id = order.id, version = updated.version, "Updated order");
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> OrderResult<bool> {
        let stmt = statement("DELETE FROM orders WHERE id = $1", [id.into()]);
        let result = bounded(self.timeout, self.db.execute_raw(stmt)).await?;

        if result.rows_affected() > 0 {
            tracing::info!(order_id = id, "Deleted order");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[async_trait]
impl PurchaseHistory for PgOrderRepository {
    async fn has_purchased(&self, user_id: i64, product_id: i64) -> ProductResult<bool> {
        let stmt = statement(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM orders o
                JOIN order_items oi ON oi.order_id = o.id
                WHERE o.user_id = $1 AND oi.product_id = $2
            ) AS purchased
            "#,
            [user_id.into(), product_id.into()],
        );

        let row = bounded(self.timeout, self.db.query_one_raw(stmt)).await?;
        match row {
            Some(row) => Ok(row.try_get::<bool>("", "purchased")?),
            None => Ok(false),
        }
    }
}
