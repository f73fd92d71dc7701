//! Products Domain
//!
//! Products, their category links and ratings, plus the stock reservation
//! used by order placement.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← Validation, review eligibility
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Data access (trait + PostgreSQL / in-memory)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Entities, DTOs, listing filters
//! └─────────────┘
//! ```
//!
//! Stock is only ever decremented through [`stock::reserve`], which performs a
//! version-guarded update on the connection or transaction it is given.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_products::{handlers, PgProductRepository, ProductService};
//!
//! let service = ProductService::new(PgProductRepository::new(db.clone()), purchase_history);
//! let router = handlers::router(service);
//! ```

pub mod error;
pub mod handlers;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod service;
pub mod stock;

pub use error::{ProductError, ProductResult};
pub use handlers::ApiDoc;
pub use models::{
    CreateProduct, CreateRating, NewRating, Product, ProductFilter, ProductPage, ProductQuery,
    Rating, UpdateProduct,
};
pub use postgres::PgProductRepository;
pub use repository::{InMemoryProductRepository, ProductRepository, PurchaseHistory};
pub use service::ProductService;
pub use stock::Reservation;
