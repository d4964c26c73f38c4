// Customer API - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod auth;
pub mod catalog;
pub mod config;
pub mod customers;
pub mod db;
pub mod error;
pub mod import;
pub mod normalizer;
pub mod pagination;
pub mod permissions;
pub mod repository;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use auth::{hash_password, identity_for_token, login, register_user, verify_password, IssuedToken};
pub use catalog::resolve_or_create_catalog_entry;
pub use config::{Config, Environment};
pub use customers::{
    create_customer, create_customer_atomic, interactions_for_customer, list_customers,
    parse_customer_filters, CreateCustomer,
};
pub use db::{
    open_database, setup_database, CatalogEntry, CatalogKind, CustomerView, InteractionSummary,
    NewCustomer, NewInteraction,
};
pub use error::{AuthFailure, RequestError, RequestResult, INSUFFICIENT_PERMISSIONS};
pub use import::{import_customers, import_interactions, ImportReport};
pub use normalizer::{label_distance, resolve, sanitize, CatalogNormalizer};
pub use pagination::{paginate, PageRequest, Paginated};
pub use permissions::{EndpointKey, Operation, OperationFlags, PermissionSet};
pub use repository::{
    CatalogRepository, CustomerField, CustomerRepository, FilterValue, InteractionRepository,
    SessionRepository, SqliteStore, UserRepository,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
