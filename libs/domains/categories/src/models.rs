use axum_helpers::Validator;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

pub const MAX_TITLE_LENGTH: usize = 1000;

/// Category entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromQueryResult)]
pub struct Category {
    pub id: i64,
    pub title: String,
    /// Image URL, empty when not set
    pub image: String,
    /// Incremented on every successful update
    pub version: i32,
}

impl Category {
    /// Merge a partial update into this category.
    pub fn apply_update(&mut self, input: UpdateCategory) {
        if let Some(title) = input.title {
            self.title = title;
        }
        if let Some(image) = input.image {
            self.image = image;
        }
    }

    /// Validate the state that is about to be persisted.
    pub fn validate_state(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(!self.title.is_empty(), "title", "must be provided")
            .check(
                self.title.chars().count() <= MAX_TITLE_LENGTH,
                "title",
                "must not be more than 1000 characters long",
            );
        v.finish()
    }
}

/// DTO for creating a category
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCategory {
    #[validate(length(min = 1, max = 1000, message = "must be between 1 and 1000 characters long"))]
    pub title: String,
    #[serde(default)]
    pub image: String,
}

/// DTO for a partial category update
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCategory {
    #[validate(length(min = 1, max = 1000, message = "must be between 1 and 1000 characters long"))]
    pub title: Option<String>,
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category() -> Category {
        Category {
            id: 1,
            title: "Shoes".to_string(),
            image: String::new(),
            version: 1,
        }
    }

    #[test]
    fn test_apply_update_only_touches_given_fields() {
        let mut c = category();
        c.apply_update(UpdateCategory {
            title: None,
            image: Some("shoes.png".to_string()),
        });
        assert_eq!(c.title, "Shoes");
        assert_eq!(c.image, "shoes.png");
    }

    #[test]
    fn test_validate_state_rejects_empty_title() {
        let mut c = category();
        c.title.clear();
        let errors = c.validate_state().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
    }

    #[test]
    fn test_title_limit_counts_characters() {
        let mut c = category();
        c.title = "ü".repeat(MAX_TITLE_LENGTH);
        assert!(c.validate_state().is_ok());

        c.title.push('ü');
        assert!(c.validate_state().is_err());
    }

    #[test]
    fn test_create_category_validation() {
        let input = CreateCategory {
            title: String::new(),
            image: String::new(),
        };
        assert!(input.validate().is_err());
    }
}
