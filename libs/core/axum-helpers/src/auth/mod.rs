//! Request principal and permission-gated extractors.
//!
//! An authentication middleware (see `domain_users::middleware::authenticate`)
//! resolves the bearer token once per request and stores a [`Principal`] in
//! the request extensions. Handlers then declare what they need:
//!
//! ```ignore
//! async fn create_product(
//!     Authorized { user, .. }: Authorized<ProductsWrite>,
//!     ValidatedJson(input): ValidatedJson<CreateProduct>,
//! ) -> Result<impl IntoResponse, AppError> { ... }
//! ```

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;

/// Authenticated account attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub activated: bool,
    pub permissions: Vec<String>,
}

impl CurrentUser {
    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.iter().any(|p| p == code)
    }
}

/// Who is making the request. Requests without an `Authorization` header are anonymous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User(CurrentUser),
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }
}

/// A permission code checked by [`Authorized`].
pub trait Permission: Send + Sync + 'static {
    const CODE: &'static str;
}

/// `products:read`
pub struct ProductsRead;
/// `products:write`
pub struct ProductsWrite;
/// `products:order`
pub struct ProductsOrder;

impl Permission for ProductsRead {
    const CODE: &'static str = "products:read";
}

impl Permission for ProductsWrite {
    const CODE: &'static str = "products:write";
}

impl Permission for ProductsOrder {
    const CODE: &'static str = "products:order";
}

const AUTHENTICATION_REQUIRED: &str = "you must be authenticated to access this resource";
const ACTIVATION_REQUIRED: &str = "your user account must be activated to access this resource";
const PERMISSION_REQUIRED: &str =
    "your user account doesn't have the necessary permissions to access this resource";

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Principal>() {
            Some(Principal::User(user)) => Ok(user.clone()),
            _ => Err(AppError::Unauthorized(AUTHENTICATION_REQUIRED.to_string())),
        }
    }
}

/// Authenticated and activated account.
#[derive(Debug, Clone)]
pub struct ActivatedUser(pub CurrentUser);

impl<S> FromRequestParts<S> for ActivatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.activated {
            return Err(AppError::Forbidden(ACTIVATION_REQUIRED.to_string()));
        }
        Ok(ActivatedUser(user))
    }
}

/// Activated account holding permission `P`.
pub struct Authorized<P: Permission> {
    pub user: CurrentUser,
    pub permission: PhantomData<P>,
}

impl<S, P> FromRequestParts<S> for Authorized<P>
where
    S: Send + Sync,
    P: Permission,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ActivatedUser(user) = ActivatedUser::from_request_parts(parts, state).await?;
        if !user.has_permission(P::CODE) {
            tracing::info!(
                target: "audit",
                user_id = user.id,
                permission = P::CODE,
                "permission denied"
            );
            return Err(AppError::Forbidden(PERMISSION_REQUIRED.to_string()));
        }
        Ok(Authorized {
            user,
            permission: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    fn parts_with(principal: Option<Principal>) -> Parts {
        let mut request = Request::builder().uri("/").body(()).unwrap();
        if let Some(principal) = principal {
            request.extensions_mut().insert(principal);
        }
        request.into_parts().0
    }

    fn user(activated: bool, permissions: &[&str]) -> Principal {
        Principal::User(CurrentUser {
            id: 7,
            activated,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        })
    }

    async fn status_of<P: Permission>(principal: Option<Principal>) -> Result<i64, StatusCode> {
        let mut parts = parts_with(principal);
        Authorized::<P>::from_request_parts(&mut parts, &())
            .await
            .map(|a| a.user.id)
            .map_err(|e| e.into_response().status())
    }

    #[tokio::test]
    async fn test_anonymous_is_unauthorized() {
        assert_eq!(
            status_of::<ProductsRead>(Some(Principal::Anonymous)).await,
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(status_of::<ProductsRead>(None).await, Err(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_inactive_account_is_forbidden() {
        let principal = user(false, &["products:read"]);
        assert_eq!(
            status_of::<ProductsRead>(Some(principal)).await,
            Err(StatusCode::FORBIDDEN)
        );
    }

    #[tokio::test]
    async fn test_missing_permission_is_forbidden() {
        let principal = user(true, &["products:read"]);
        assert_eq!(
            status_of::<ProductsWrite>(Some(principal)).await,
            Err(StatusCode::FORBIDDEN)
        );
    }

    #[tokio::test]
    async fn test_granted_permission_passes() {
        let principal = user(true, &["products:read", "products:order"]);
        assert_eq!(status_of::<ProductsOrder>(Some(principal)).await, Ok(7));
    }
}
