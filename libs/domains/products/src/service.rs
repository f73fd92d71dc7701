//! Product Service - Business logic layer

use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

use crate::error::{ProductError, ProductResult};
use crate::models::{
    CreateProduct, CreateRating, NewRating, Product, ProductPage, ProductQuery, Rating,
    UpdateProduct,
};
use crate::repository::{ProductRepository, PurchaseHistory};

/// Product service providing business logic operations
///
/// `H` answers whether a user has ordered a product; ratings are only accepted
/// from such users.
pub struct ProductService<R: ProductRepository, H: PurchaseHistory> {
    repository: Arc<R>,
    purchases: Arc<H>,
}

impl<R: ProductRepository, H: PurchaseHistory> ProductService<R, H> {
    pub fn new(repository: R, purchases: H) -> Self {
        Self {
            repository: Arc::new(repository),
            purchases: Arc::new(purchases),
        }
    }

    /// Create a product owned by `owner_id`
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_product(&self, owner_id: i64, input: CreateProduct) -> ProductResult<Product> {
        input.validate()?;
        self.repository.create(owner_id, input).await
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: i64) -> ProductResult<Product> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(ProductError::NotFound(id))
    }

    /// Validate the query, then fetch one page. An invalid query never reaches the store.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: ProductQuery) -> ProductResult<ProductPage> {
        let filter = query.into_filter()?;
        let (products, metadata) = self.repository.list(filter).await?;
        Ok(ProductPage { products, metadata })
    }

    /// Merge `input` into the current product and write it back, guarded by
    /// the version that was read.
    #[instrument(skip(self, input))]
    pub async fn update_product(&self, id: i64, input: UpdateProduct) -> ProductResult<Product> {
        input.validate()?;

        let mut product = self.get_product(id).await?;
        product.apply_update(input);
        product.validate_state()?;

        self.repository.update(&product).await
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: i64) -> ProductResult<()> {
        if !self.repository.delete(id).await? {
            return Err(ProductError::NotFound(id));
        }
        Ok(())
    }

    /// Record a rating from `user_id`, who must have ordered the product.
    #[instrument(skip(self, input), fields(rating = input.rating))]
    pub async fn rate_product(
        &self,
        user_id: i64,
        product_id: i64,
        input: CreateRating,
    ) -> ProductResult<Rating> {
        input.validate()?;

        // Unknown products are reported as such, not as an ineligible review.
        self.get_product(product_id).await?;

        if !self.purchases.has_purchased(user_id, product_id).await? {
            return Err(ProductError::NotPermitted {
                user_id,
                product_id,
            });
        }

        self.repository
            .insert_rating(NewRating {
                product_id,
                user_id,
                rating: input.rating,
                comment: input.comment,
            })
            .await
    }
}
