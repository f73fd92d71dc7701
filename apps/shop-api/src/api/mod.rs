use axum::{Router, middleware, routing::get};
use domain_categories::{CategoryService, PgCategoryRepository};
use domain_orders::{OrderService, PgOrderRepository};
use domain_products::{PgProductRepository, ProductService};
use domain_users::{PgUserRepository, UserService, middleware::authenticate};
use std::sync::Arc;

use crate::state::AppState;

pub mod health;

/// Creates the API routes without the `/api` prefix.
/// The `/api` prefix is added by `create_router`.
///
/// Every route runs behind `authenticate`, so handlers see a `Principal`
/// (anonymous when no token was sent).
pub fn routes(state: &AppState) -> Router {
    let timeout = state.config.database.query_timeout();

    let categories = PgCategoryRepository::new(state.db.clone()).with_timeout(timeout);
    let products = PgProductRepository::new(state.db.clone()).with_timeout(timeout);
    let orders = PgOrderRepository::new(state.db.clone()).with_timeout(timeout);
    let users_repo = PgUserRepository::new(state.db.clone()).with_timeout(timeout);

    let users = Arc::new(UserService::new(
        users_repo.clone(),
        users_repo.clone(),
        users_repo,
    ));

    Router::new()
        .merge(domain_users::handlers::router(users.clone()))
        .nest(
            "/categories",
            domain_categories::handlers::router(CategoryService::new(categories)),
        )
        .nest(
            "/products",
            // Purchase history for the rating gate comes from the orders store.
            domain_products::handlers::router(ProductService::new(products, orders.clone())),
        )
        .nest(
            "/orders",
            domain_orders::handlers::router(OrderService::new(orders)),
        )
        .layer(middleware::from_fn_with_state(
            users,
            authenticate::<PgUserRepository, PgUserRepository, PgUserRepository>,
        ))
}

/// Router with `/ready`, which checks the database.
///
/// Has its state applied so it can be merged with the stateless app router.
pub fn ready_router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Environment};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use core_config::{app_info, rate_limit::RateLimitConfig, server::ServerConfig};
    use database::postgres::PostgresConfig;
    use http_body_util::BodyExt;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::Value;
    use tower::ServiceExt; // For oneshot()

    async fn app() -> Router {
        let config = Config {
            app: app_info!(),
            database: PostgresConfig::new("postgresql://localhost/shop"),
            server: ServerConfig::default(),
            rate_limit: RateLimitConfig {
                enabled: false,
                ..RateLimitConfig::default()
            },
            environment: Environment::Development,
        };
        let state = AppState {
            db: MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
            config,
        };

        axum_helpers::create_router::<crate::openapi::ApiDoc>(
            routes(&state),
            &state.config.server,
            &state.config.rate_limit,
        )
        .await
        .unwrap()
    }

    async fn json_body(body: Body) -> Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_anonymous_listing_requires_authentication() {
        let response = app()
            .await
            .oneshot(Request::get("/api/products").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(response.headers()[header::VARY], "Authorization");
    }

    #[tokio::test]
    async fn test_malformed_bearer_token_is_rejected() {
        let response = app()
            .await
            .oneshot(
                Request::get("/api/orders")
                    .header(header::AUTHORIZATION, "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_not_found() {
        let response = app()
            .await
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response.into_body()).await;
        assert_eq!(body["error"], "NOT_FOUND");
    }
}
