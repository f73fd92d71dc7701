use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{patch, post, put},
};
use axum_helpers::{
    ActivatedUser, AuditEvent, AuditOutcome, ValidatedJson,
    errors::responses::{
        BadRequestValidationResponse, ConflictResponse, ForbiddenResponse,
        InternalServerErrorResponse, NotFoundResponse, UnauthorizedResponse,
    },
};
use serde_json::json;
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::{UserError, UserResult};
use crate::models::{
    ActivateUser, AuthenticationToken, LoginRequest, RegisterUser, UpdateProfile, User,
};
use crate::repository::{PermissionRepository, TokenRepository, UserRepository};
use crate::service::UserService;

const TAG: &str = "Users";

/// OpenAPI documentation for Users API
#[derive(OpenApi)]
#[openapi(
    paths(register_user, activate_user, update_profile, create_authentication_token),
    components(
        schemas(User, RegisterUser, ActivateUser, UpdateProfile, LoginRequest, AuthenticationToken),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            ConflictResponse,
            UnauthorizedResponse,
            ForbiddenResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = TAG, description = "Registration, activation and authentication endpoints")
    )
)]
pub struct ApiDoc;

type SharedService<U, T, P> = Arc<UserService<U, T, P>>;

/// Create the router for `/users` and `/tokens`.
///
/// Takes the shared service so the same instance can back the
/// authentication middleware.
pub fn router<U, T, P>(service: SharedService<U, T, P>) -> Router
where
    U: UserRepository + 'static,
    T: TokenRepository + 'static,
    P: PermissionRepository + 'static,
{
    Router::new()
        .route("/users", post(register_user))
        .route("/users/activated", put(activate_user))
        .route("/users/me", patch(update_profile))
        .route("/tokens/authentication", post(create_authentication_token))
        .with_state(service)
}

/// Register a new account
///
/// The account starts inactive; an activation token is delivered separately.
#[utoipa::path(
    post,
    path = "/users",
    tag = TAG,
    request_body = RegisterUser,
    responses(
        (status = 202, description = "Account created, activation pending", body = User),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn register_user<U, T, P>(
    State(service): State<SharedService<U, T, P>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<RegisterUser>,
) -> UserResult<impl IntoResponse>
where
    U: UserRepository,
    T: TokenRepository,
    P: PermissionRepository,
{
    let user = service.register(input).await?;

    AuditEvent::new(
        Some(user.id),
        "user.register",
        Some(format!("user:{}", user.id)),
        AuditOutcome::Success,
    )
    .with_request_headers(&headers)
    .log();

    Ok((StatusCode::ACCEPTED, Json(user)))
}

/// Activate an account with its activation token
#[utoipa::path(
    put,
    path = "/users/activated",
    tag = TAG,
    request_body = ActivateUser,
    responses(
        (status = 200, description = "Account activated", body = User),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn activate_user<U, T, P>(
    State(service): State<SharedService<U, T, P>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<ActivateUser>,
) -> UserResult<Json<User>>
where
    U: UserRepository,
    T: TokenRepository,
    P: PermissionRepository,
{
    let user = service.activate(input).await?;

    AuditEvent::new(
        Some(user.id),
        "user.activate",
        Some(format!("user:{}", user.id)),
        AuditOutcome::Success,
    )
    .with_request_headers(&headers)
    .log();

    Ok(Json(user))
}

/// Update the caller's profile
#[utoipa::path(
    patch,
    path = "/users/me",
    tag = TAG,
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_profile<U, T, P>(
    ActivatedUser(current): ActivatedUser,
    State(service): State<SharedService<U, T, P>>,
    ValidatedJson(input): ValidatedJson<UpdateProfile>,
) -> UserResult<Json<User>>
where
    U: UserRepository,
    T: TokenRepository,
    P: PermissionRepository,
{
    let user = service.update_profile(current.id, input).await?;
    Ok(Json(user))
}

/// Exchange email and password for an authentication token
#[utoipa::path(
    post,
    path = "/tokens/authentication",
    tag = TAG,
    request_body = LoginRequest,
    responses(
        (status = 201, description = "Token issued", body = AuthenticationToken),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_authentication_token<U, T, P>(
    State(service): State<SharedService<U, T, P>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<LoginRequest>,
) -> UserResult<impl IntoResponse>
where
    U: UserRepository,
    T: TokenRepository,
    P: PermissionRepository,
{
    let email = input.email.clone();

    match service.create_authentication_token(input).await {
        Ok(token) => {
            AuditEvent::new(
                Some(token.user_id),
                "user.login",
                Some(format!("user:{}", token.user_id)),
                AuditOutcome::Success,
            )
            .with_request_headers(&headers)
            .log();

            Ok((StatusCode::CREATED, Json(AuthenticationToken::from(token))))
        }
        Err(err) => {
            if matches!(err, UserError::InvalidCredentials) {
                AuditEvent::new(None, "user.login", None, AuditOutcome::Denied)
                    .with_request_headers(&headers)
                    .with_details(json!({ "email": email }))
                    .log();
            }
            Err(err)
        }
    }
}
