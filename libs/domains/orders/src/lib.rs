//! Orders Domain
//!
//! Order placement with stock reservation, plus listing, update and delete of
//! a customer's own orders.
//!
//! Placement runs every reservation and both inserts in one transaction: a
//! failure on any line leaves stock exactly as it was. Reservations use the
//! version-guarded update from [`domain_products::stock`], so two customers
//! racing for the last unit cannot both succeed.
//!
//! The repositories also implement [`domain_products::PurchaseHistory`],
//! which backs the rating eligibility check.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_orders::{handlers, OrderService, PgOrderRepository};
//!
//! let orders = PgOrderRepository::new(db.clone());
//! let router = handlers::router(OrderService::new(orders.clone()));
//! ```

pub mod error;
pub mod handlers;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod service;

pub use error::{OrderError, OrderResult};
pub use handlers::ApiDoc;
pub use models::{
    Order, OrderItem, OrderLine, OrderPage, OrderQuery, PlaceOrder, UpdateOrder,
};
pub use postgres::PgOrderRepository;
pub use repository::{InMemoryOrderRepository, OrderRepository};
pub use service::OrderService;
