use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use axum_helpers::{
    AuditEvent, AuditOutcome, Authorized, IdPath, Metadata, ProductsRead, ProductsWrite,
    QueryParams, ValidatedJson,
    errors::responses::{
        BadRequestValidationResponse, ConflictResponse, ForbiddenResponse,
        InternalServerErrorResponse, NotFoundResponse, UnauthorizedResponse,
        NotPermittedResponse,
    },
};
use serde_json::json;
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::ProductResult;
use crate::models::{
    CreateProduct, CreateRating, Product, ProductPage, ProductQuery, Rating, UpdateProduct,
};
use crate::repository::{ProductRepository, PurchaseHistory};
use crate::service::ProductService;

const TAG: &str = "Products";

/// OpenAPI documentation for Products API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_products,
        create_product,
        get_product,
        update_product,
        delete_product,
        rate_product,
    ),
    components(
        schemas(Product, ProductPage, Metadata, CreateProduct, UpdateProduct, Rating, CreateRating),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            ConflictResponse,
            NotPermittedResponse,
            UnauthorizedResponse,
            ForbiddenResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = TAG, description = "Product catalog and rating endpoints")
    )
)]
pub struct ApiDoc;

type SharedService<R, H> = Arc<ProductService<R, H>>;

/// Create the product router
pub fn router<R, H>(service: ProductService<R, H>) -> Router
where
    R: ProductRepository + 'static,
    H: PurchaseHistory + 'static,
{
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/{id}",
            get(get_product).patch(update_product).delete(delete_product),
        )
        .route("/{id}/ratings", post(rate_product))
        .with_state(shared_service)
}

/// List products with search, category filter, sorting and pagination
#[utoipa::path(
    get,
    path = "",
    tag = TAG,
    params(ProductQuery),
    responses(
        (status = 200, description = "One page of products", body = ProductPage),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_products<R: ProductRepository, H: PurchaseHistory>(
    _auth: Authorized<ProductsRead>,
    State(service): State<SharedService<R, H>>,
    QueryParams(query): QueryParams<ProductQuery>,
) -> ProductResult<Json<ProductPage>> {
    let page = service.list_products(query).await?;
    Ok(Json(page))
}

/// Create a product owned by the caller
#[utoipa::path(
    post,
    path = "",
    tag = TAG,
    request_body = CreateProduct,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_product<R: ProductRepository, H: PurchaseHistory>(
    Authorized { user, .. }: Authorized<ProductsWrite>,
    State(service): State<SharedService<R, H>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<CreateProduct>,
) -> ProductResult<impl IntoResponse> {
    let product = service.create_product(user.id, input).await?;

    AuditEvent::new(
        Some(user.id),
        "product.create",
        Some(format!("product:{}", product.id)),
        AuditOutcome::Success,
    )
    .with_request_headers(&headers)
    .with_details(json!({
        "title": product.title,
        "categories": product.categories.iter().map(|c| c.id).collect::<Vec<_>>(),
    }))
    .log();

    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product with its categories, ratings and average rating
#[utoipa::path(
    get,
    path = "/{id}",
    tag = TAG,
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_product<R: ProductRepository, H: PurchaseHistory>(
    _auth: Authorized<ProductsRead>,
    State(service): State<SharedService<R, H>>,
    IdPath(id): IdPath,
) -> ProductResult<Json<Product>> {
    let product = service.get_product(id).await?;
    Ok(Json(product))
}

/// Partially update a product
#[utoipa::path(
    patch,
    path = "/{id}",
    tag = TAG,
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    request_body = UpdateProduct,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_product<R: ProductRepository, H: PurchaseHistory>(
    _auth: Authorized<ProductsWrite>,
    State(service): State<SharedService<R, H>>,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<UpdateProduct>,
) -> ProductResult<Json<Product>> {
    let product = service.update_product(id, input).await?;
    Ok(Json(product))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = TAG,
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_product<R: ProductRepository, H: PurchaseHistory>(
    Authorized { user, .. }: Authorized<ProductsWrite>,
    State(service): State<SharedService<R, H>>,
    headers: HeaderMap,
    IdPath(id): IdPath,
) -> ProductResult<impl IntoResponse> {
    service.delete_product(id).await?;

    AuditEvent::new(
        Some(user.id),
        "product.delete",
        Some(format!("product:{}", id)),
        AuditOutcome::Success,
    )
    .with_request_headers(&headers)
    .log();

    Ok(StatusCode::NO_CONTENT)
}

/// Rate a product the caller has ordered
#[utoipa::path(
    post,
    path = "/{id}/ratings",
    tag = TAG,
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    request_body = CreateRating,
    responses(
        (status = 201, description = "Rating recorded", body = Rating),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 422, response = NotPermittedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn rate_product<R: ProductRepository, H: PurchaseHistory>(
    Authorized { user, .. }: Authorized<ProductsRead>,
    State(service): State<SharedService<R, H>>,
    headers: HeaderMap,
    IdPath(id): IdPath,
    ValidatedJson(input): ValidatedJson<CreateRating>,
) -> ProductResult<impl IntoResponse> {
    let rating = service.rate_product(user.id, id, input).await?;

    AuditEvent::new(
        Some(user.id),
        "product.rate",
        Some(format!("product:{}", id)),
        AuditOutcome::Success,
    )
    .with_request_headers(&headers)
    .with_details(json!({ "rating": rating.rating }))
    .log();

    Ok((StatusCode::CREATED, Json(rating)))
}
