use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

use crate::error::{CategoryError, CategoryResult};
use crate::models::{Category, CreateCategory, UpdateCategory};
use crate::repository::CategoryRepository;

/// Service layer for Category business logic
pub struct CategoryService<R: CategoryRepository> {
    repository: Arc<R>,
}

impl<R: CategoryRepository> CategoryService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_category(&self, input: CreateCategory) -> CategoryResult<Category> {
        input.validate()?;
        self.repository.create(input).await
    }

    #[instrument(skip(self))]
    pub async fn get_category(&self, id: i64) -> CategoryResult<Category> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(CategoryError::NotFound(id))
    }

    pub async fn list_categories(&self) -> CategoryResult<Vec<Category>> {
        self.repository.list().await
    }

    /// Merge `input` into the current category and write it back, guarded by
    /// the version that was read.
    #[instrument(skip(self, input))]
    pub async fn update_category(
        &self,
        id: i64,
        input: UpdateCategory,
    ) -> CategoryResult<Category> {
        input.validate()?;

        let mut category = self.get_category(id).await?;
        category.apply_update(input);
        category.validate_state()?;

        self.repository.update(&category).await
    }

    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: i64) -> CategoryResult<()> {
        if !self.repository.delete(id).await? {
            return Err(CategoryError::NotFound(id));
        }
        Ok(())
    }
}
