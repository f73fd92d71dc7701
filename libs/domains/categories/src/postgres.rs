use async_trait::async_trait;
use database::postgres::{DEFAULT_QUERY_TIMEOUT, bounded, statement};
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult};
use std::time::Duration;

use crate::{
    error::{CategoryError, CategoryResult},
    models::{Category, CreateCategory},
    repository::CategoryRepository,
};

#[derive(Clone)]
pub struct PgCategoryRepository {
    db: DatabaseConnection,
    timeout: Duration,
}

impl PgCategoryRepository {
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
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn create(&self, input: CreateCategory) -> CategoryResult<Category> {
        let stmt = statement(
            r#"
            INSERT INTO categories (title, image)
            VALUES ($1, $2)
            RETURNING id, title, image, version
            "#,
            [input.title.into(), input.image.into()],
        );

        let category = bounded(
            self.timeout,
            Category::find_by_statement(stmt).one(&self.db),
        )
        .await?
        .ok_or_else(|| CategoryError::Internal("insert returned no row".to_string()))?;

        tracing::info!(category_id = category.id, "Created category");
        Ok(category)
    }

    async fn get_by_id(&self, id: i64) -> CategoryResult<Option<Category>> {
        let stmt = statement(
            "SELECT id, title, image, version FROM categories WHERE id = $1",
            [id.into()],
        );

        Ok(bounded(self.timeout, Category::find_by_statement(stmt).one(&self.db)).await?)
    }

    async fn list(&self) -> CategoryResult<Vec<Category>> {
        let stmt = statement(
            "SELECT id, title, image, version FROM categories ORDER BY id",
            [],
        );

        Ok(bounded(self.timeout, Category::find_by_statement(stmt).all(&self.db)).await?)
    }

    async fn update(&self, category: &Category) -> CategoryResult<Category> {
        let stmt = statement(
            r#"
            UPDATE categories
            SET title = $1, image = $2, version = version + 1
            WHERE id = $3 AND version = $4
            RETURNING id, title, image, version
            "#,
            [
                category.title.clone().into(),
                category.image.clone().into(),
                category.id.into(),
                category.version.into(),
            ],
        );

        let updated = bounded(
            self.timeout,
            Category::find_by_statement(stmt).one(&self.db),
        )
        .await?
        .ok_or(CategoryError::EditConflict(category.id))?;

        tracing::info!(category_id = category.id, version = updated.version, "Updated category");
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> CategoryResult<bool> {
        let stmt = statement("DELETE FROM categories WHERE id = $1", [id.into()]);
        let result = bounded(self.timeout, self.db.execute_raw(stmt)).await?;

        if result.rows_affected() > 0 {
            tracing::info!(category_id = id, "Deleted category");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
