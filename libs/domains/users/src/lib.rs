//! Users Domain
//!
//! Accounts, tokens and permissions.
//!
//! - Registration hashes the password with Argon2, grants `products:read`
//!   and `products:order`, and issues a 3 day activation token.
//! - Tokens are 16 random bytes handed out hex-encoded; only their SHA-256
//!   digest is stored.
//! - [`middleware::authenticate`] turns a bearer token into the request's
//!   `Principal`, which the `Authorized<P>` extractor checks per route.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_users::{handlers, middleware::authenticate, PgUserRepository, UserService};
//!
//! let repo = PgUserRepository::new(db.clone());
//! let users = Arc::new(UserService::new(repo.clone(), repo.clone(), repo));
//! let router = handlers::router(users.clone())
//!     .layer(axum::middleware::from_fn_with_state(users, authenticate));
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod notifier;
pub mod postgres;
pub mod repository;
pub mod service;

pub use error::{UserError, UserResult};
pub use handlers::ApiDoc;
pub use models::{
    ActivateUser, AuthenticationToken, LoginRequest, RegisterUser, Token, TokenScope,
    UpdateProfile, User,
};
pub use notifier::{ActivationNotifier, LoggingNotifier};
pub use postgres::PgUserRepository;
pub use repository::{
    InMemoryUserRepository, PermissionRepository, TokenRepository, UserRepository,
};
pub use service::UserService;
