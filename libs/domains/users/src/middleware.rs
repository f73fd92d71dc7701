//! Bearer token authentication.
//!
//! Every request leaves this middleware with a [`Principal`] in its
//! extensions, or is rejected with 401 when it presented a bad token.
//! Permission checks happen later, in the `Authorized<P>` extractor.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_helpers::Principal;
use std::sync::Arc;

use crate::error::UserError;
use crate::models::TOKEN_PLAINTEXT_LEN;
use crate::repository::{PermissionRepository, TokenRepository, UserRepository};
use crate::service::UserService;

/// Resolve `Authorization: Bearer <token>` into the request's [`Principal`].
///
/// ```rust,ignore
/// let app = router.layer(middleware::from_fn_with_state(users.clone(), authenticate));
/// ```
pub async fn authenticate<U, T, P>(
    State(service): State<Arc<UserService<U, T, P>>>,
    mut request: Request,
    next: Next,
) -> Response
where
    U: UserRepository + 'static,
    T: TokenRepository + 'static,
    P: PermissionRepository + 'static,
{
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|value| bearer_token(value).map(str::to_owned));

    let principal = match presented {
        None => Ok(Principal::Anonymous),
        Some(Some(token)) => service.authenticate(&token).await.map(Principal::User),
        Some(None) => Err(UserError::InvalidToken),
    };

    let mut response = match principal {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let token = value.to_str().ok()?.strip_prefix("Bearer ")?;
    (token.len() == TOKEN_PLAINTEXT_LEN).then_some(token)
}
