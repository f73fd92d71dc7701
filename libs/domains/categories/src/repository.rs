use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{CategoryError, CategoryResult};
use crate::models::{Category, CreateCategory};

/// Repository trait for Category persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, input: CreateCategory) -> CategoryResult<Category>;

    /// Get a category by ID
    async fn get_by_id(&self, id: i64) -> CategoryResult<Option<Category>>;

    /// List all categories ordered by ID
    async fn list(&self) -> CategoryResult<Vec<Category>>;

    /// Persist `category` if its stored version still equals `category.version`.
    ///
    /// Returns the stored category with the incremented version, or
    /// `EditConflict` when the row changed or disappeared in the meantime.
    async fn update(&self, category: &Category) -> CategoryResult<Category>;

    /// Delete a category by ID
    async fn delete(&self, id: i64) -> CategoryResult<bool>;
}

/// In-memory implementation of CategoryRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryCategoryRepository {
    state: Arc<RwLock<Store>>,
}

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    categories: BTreeMap<i64, Category>,
}

impl InMemoryCategoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// IDs from `ids` that do not exist, in input order.
    pub async fn missing(&self, ids: &[i64]) -> Vec<i64> {
        let state = self.state.read().await;
        ids.iter()
            .copied()
            .filter(|id| !state.categories.contains_key(id))
            .collect()
    }

    /// Categories for `ids` that exist, ordered by ID.
    pub async fn get_many(&self, ids: &[i64]) -> Vec<Category> {
        let state = self.state.read().await;
        state
            .categories
            .values()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CategoryRepository for InMemoryCategoryRepository {
    async fn create(&self, input: CreateCategory) -> CategoryResult<Category> {
        let mut state = self.state.write().await;
        state.next_id += 1;

        let category = Category {
            id: state.next_id,
            title: input.title,
            image: input.image,
            version: 1,
        };
        state.categories.insert(category.id, category.clone());

        tracing::info!(category_id = category.id, "Created category");
        Ok(category)
    }

    async fn get_by_id(&self, id: i64) -> CategoryResult<Option<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.get(&id).cloned())
    }

    async fn list(&self) -> CategoryResult<Vec<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.values().cloned().collect())
    }

    async fn update(&self, category: &Category) -> CategoryResult<Category> {
        let mut state = self.state.write().await;

        let stored = state
            .categories
            .get_mut(&category.id)
            .filter(|stored| stored.version == category.version)
            .ok_or(CategoryError::EditConflict(category.id))?;

        *stored = Category {
            version: category.version + 1,
            ..category.clone()
        };

        tracing::info!(category_id = category.id, "Updated category");
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> CategoryResult<bool> {
        let mut state = self.state.write().await;

        if state.categories.remove(&id).is_some() {
            tracing::info!(category_id = id, "Deleted category");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str) -> CreateCategory {
        CreateCategory {
            title: title.to_string(),
            image: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let repo = InMemoryCategoryRepository::new();

        let a = repo.create(input("Shoes")).await.unwrap();
        let b = repo.create(input("Hats")).await.unwrap();

        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(a.version, 1);
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let repo = InMemoryCategoryRepository::new();
        let created = repo.create(input("Shoes")).await.unwrap();

        let mut first = created.clone();
        first.title = "Boots".to_string();
        let updated = repo.update(&first).await.unwrap();
        assert_eq!(updated.version, 2);

        let mut stale = created;
        stale.title = "Sandals".to_string();
        let result = repo.update(&stale).await;
        assert!(matches!(result, Err(CategoryError::EditConflict(1))));

        let stored = repo.get_by_id(1).await.unwrap().unwrap();
        assert_eq!(stored.title, "Boots");
    }

    #[tokio::test]
    async fn test_missing_reports_unknown_ids() {
        let repo = InMemoryCategoryRepository::new();
        repo.create(input("Shoes")).await.unwrap();

        assert_eq!(repo.missing(&[1, 7, 9]).await, vec![7, 9]);
    }
}
