use super::shutdown::ShutdownCoordinator;
use crate::errors::handlers::{not_found, panic_response};
use crate::http::{IpRateLimiter, create_cors_layer, rate_limit, security_headers};
use axum::{Router, middleware};
use core_config::rate_limit::RateLimitConfig;
use core_config::server::ServerConfig;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;

/// How often idle rate-limiter buckets are dropped.
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Assemble the public router around the API routes.
///
/// - OpenAPI documentation (Swagger UI, ReDoc, RapiDoc, Scalar)
/// - API routes nested under `/api`
/// - JSON 404 fallback
///
/// Middleware, outermost first: panic recovery, per-IP rate limiting,
/// tracing, security headers, CORS (when origins are configured), compression.
///
/// Must be called inside a Tokio runtime when rate limiting is enabled, since
/// the limiter's cleanup task is spawned here.
pub async fn create_router<T>(
    apis: Router,
    server_config: &ServerConfig,
    rate_limit_config: &RateLimitConfig,
) -> io::Result<Router>
where
    T: OpenApi + 'static,
{
    use utoipa_rapidoc::RapiDoc;
    use utoipa_redoc::{Redoc, Servable as RedocServable};
    use utoipa_scalar::{Scalar, Servable as ScalarServable};
    use utoipa_swagger_ui::SwaggerUi;

    let cors = create_cors_layer(&server_config.cors_allowed_origins).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid CORS_ALLOWED_ORIGINS value: {}", e),
        )
    })?;

    let mut router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", T::openapi()))
        .merge(Redoc::with_url("/redoc", T::openapi()))
        .merge(RapiDoc::new("/api-docs/openapi.json").path("/rapidoc"))
        .merge(Scalar::with_url("/scalar", T::openapi()))
        .nest("/api", apis)
        .fallback(not_found)
        .layer(CompressionLayer::new());

    match cors {
        Some(cors) => {
            info!(origins = ?server_config.cors_allowed_origins, "CORS enabled");
            router = router.layer(cors);
        }
        None => info!("CORS disabled, no trusted origins configured"),
    }

    router = router
        .layer(middleware::from_fn(security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    if let Some(limiter) = IpRateLimiter::from_config(rate_limit_config) {
        info!(
            rps = rate_limit_config.requests_per_second,
            burst = rate_limit_config.burst,
            "rate limiting enabled"
        );
        limiter.spawn_cleanup(LIMITER_CLEANUP_INTERVAL);
        router = router.layer(middleware::from_fn_with_state(limiter, rate_limit));
    }

    Ok(router.layer(CatchPanicLayer::custom(panic_response)))
}

/// Serve `router` until SIGINT/SIGTERM, then run `cleanup` within the
/// configured shutdown timeout.
///
/// Connections are accepted with peer address info so the rate limiter can
/// key on the client IP.
pub async fn create_production_app<F>(
    router: Router,
    server_config: &ServerConfig,
    cleanup: F,
) -> io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let coordinator = ShutdownCoordinator::new();
    let shutdown_handle = coordinator.clone();
    let shutdown_timeout = server_config.shutdown_timeout;

    let listener = tokio::net::TcpListener::bind(server_config.address()).await?;
    info!("Server starting on {}", listener.local_addr()?);

    let cleanup_handle = tokio::spawn(async move {
        shutdown_handle.wait_for_shutdown().await;

        info!(timeout = ?shutdown_timeout, "running cleanup tasks");
        if tokio::time::timeout(shutdown_timeout, cleanup).await.is_err() {
            tracing::warn!(timeout = ?shutdown_timeout, "cleanup exceeded timeout, forcing shutdown");
        } else {
            info!("cleanup completed");
        }
    });

    let serve_result = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { coordinator.wait_for_signal().await })
    .await
    .inspect_err(|e| {
        tracing::error!("Server encountered an error: {:?}", e);
    });

    cleanup_handle.await.ok();

    serve_result
}
