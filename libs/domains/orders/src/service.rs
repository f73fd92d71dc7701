//! Order Service - Business logic layer

use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

use crate::error::{OrderError, OrderResult};
use crate::models::{Order, OrderPage, OrderQuery, PlaceOrder, UpdateOrder};
use crate::repository::OrderRepository;

pub struct OrderService<R: OrderRepository> {
    repository: Arc<R>,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Place an order for `user_id`.
    ///
    /// Conflicts are returned to the caller; placement is never retried here.
    #[instrument(skip(self, input), fields(lines = input.items.len()))]
    pub async fn place_order(&self, user_id: i64, input: PlaceOrder) -> OrderResult<Order> {
        input.validate()?;
        self.repository.place(user_id, input).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self, user_id: i64, query: OrderQuery) -> OrderResult<OrderPage> {
        let filters = query.into_filters()?;
        let (orders, metadata) = self.repository.list_for_user(user_id, filters).await?;
        Ok(OrderPage { orders, metadata })
    }

    #[instrument(skip(self, input))]
    pub async fn update_order(
        &self,
        user_id: i64,
        id: i64,
        input: UpdateOrder,
    ) -> OrderResult<Order> {
        input.validate()?;

        let mut order = self.owned_order(user_id, id).await?;
        order.apply_update(input);
        order.validate_state()?;

        self.repository.update(&order).await
    }

    #[instrument(skip(self))]
    pub async fn delete_order(&self, user_id: i64, id: i64) -> OrderResult<()> {
        self.owned_order(user_id, id).await?;

        if !self.repository.delete(id).await? {
            return Err(OrderError::NotFound(id));
        }
        Ok(())
    }

    async fn owned_order(&self, user_id: i64, id: i64) -> OrderResult<Order> {
        let order = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or(OrderError::NotFound(id))?;

        if order.user_id != user_id {
            return Err(OrderError::NotOwner {
                user_id,
                order_id: id,
            });
        }
        Ok(order)
    }
}
