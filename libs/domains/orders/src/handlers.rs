use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, put},
};
use axum_helpers::{
    AuditEvent, AuditOutcome, Authorized, IdPath, ProductsOrder, ProductsRead, QueryParams,
    ValidatedJson,
    errors::responses::{
        BadRequestValidationResponse, ConflictResponse, ForbiddenResponse,
        InternalServerErrorResponse, NotFoundResponse, UnauthorizedResponse,
    },
};
use serde_json::json;
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::OrderResult;
use crate::models::{Order, OrderItem, OrderLine, OrderPage, OrderQuery, PlaceOrder, UpdateOrder};
use crate::repository::OrderRepository;
use crate::service::OrderService;

const TAG: &str = "Orders";

/// OpenAPI documentation for Orders API
#[derive(OpenApi)]
#[openapi(
    paths(list_orders, place_order, update_order, delete_order),
    components(
        schemas(Order, OrderItem, OrderLine, OrderPage, PlaceOrder, UpdateOrder),
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
        (name = TAG, description = "Order placement and management endpoints")
    )
)]
pub struct ApiDoc;

/// Create the order router
pub fn router<R: OrderRepository + 'static>(service: OrderService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_orders).post(place_order))
        .route("/{id}", put(update_order).delete(delete_order))
        .with_state(shared_service)
}

/// List the caller's orders
#[utoipa::path(
    get,
    path = "",
    tag = TAG,
    params(OrderQuery),
    responses(
        (status = 200, description = "One page of orders", body = OrderPage),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_orders<R: OrderRepository>(
    Authorized { user, .. }: Authorized<ProductsRead>,
    State(service): State<Arc<OrderService<R>>>,
    QueryParams(query): QueryParams<OrderQuery>,
) -> OrderResult<Json<OrderPage>> {
    let page = service.list_orders(user.id, query).await?;
    Ok(Json(page))
}

/// Place an order, reserving stock for every line
#[utoipa::path(
    post,
    path = "",
    tag = TAG,
    request_body = PlaceOrder,
    responses(
        (status = 201, description = "Order placed", body = Order),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn place_order<R: OrderRepository>(
    Authorized { user, .. }: Authorized<ProductsOrder>,
    State(service): State<Arc<OrderService<R>>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<PlaceOrder>,
) -> OrderResult<impl IntoResponse> {
    let lines = input.lines();

    match service.place_order(user.id, input).await {
        Ok(order) => {
            AuditEvent::new(
                Some(user.id),
                "order.place",
                Some(format!("order:{}", order.id)),
                AuditOutcome::Success,
            )
            .with_request_headers(&headers)
            .with_details(json!({ "lines": lines, "total_price": order.total_price }))
            .log();

            Ok((StatusCode::CREATED, Json(order)))
        }
        Err(err) => {
            AuditEvent::new(Some(user.id), "order.place", None, AuditOutcome::Failure)
                .with_request_headers(&headers)
                .with_details(json!({ "lines": lines, "reason": err.to_string() }))
                .log();

            Err(err)
        }
    }
}

/// Update one of the caller's orders
#[utoipa::path(
    put,
    path = "/{id}",
    tag = TAG,
    params(
        ("id" = i64, Path, description = "Order ID")
    ),
    request_body = UpdateOrder,
    responses(
        (status = 200, description = "Order updated", body = Order),
        (status = 400, response = BadRequestValidationResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_order<R: OrderRepository>(
    Authorized { user, .. }: Authorized<ProductsOrder>,
    State(service): State<Arc<OrderService<R>>>,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<UpdateOrder>,
) -> OrderResult<Json<Order>> {
    let order = service.update_order(user.id, id, input).await?;
    Ok(Json(order))
}

/// Delete one of the caller's orders
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = TAG,
    params(
        ("id" = i64, Path, description = "Order ID")
    ),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_order<R: OrderRepository>(
    Authorized { user, .. }: Authorized<ProductsOrder>,
    State(service): State<Arc<OrderService<R>>>,
    headers: HeaderMap,
    IdPath(id): IdPath,
) -> OrderResult<impl IntoResponse> {
    service.delete_order(user.id, id).await?;

    AuditEvent::new(
        Some(user.id),
        "order.delete",
        Some(format!("order:{}", id)),
        AuditOutcome::Success,
    )
    .with_request_headers(&headers)
    .log();

    Ok(StatusCode::NO_CONTENT)
}
