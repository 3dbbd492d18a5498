use axum::{Router, routing::get};

pub mod accounts;
pub mod customers;
pub mod system;
pub mod transactions;

/// Router for every resource endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/accounts", accounts::router())
        .nest("/customers", customers::router())
        .nest("/transactions", transactions::router())
}
