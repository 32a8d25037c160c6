use axum::{routing::get, Router};

pub mod rules;
pub mod system;

/// Router for every endpoint; access is decided by the gate middleware, not here.
pub fn router() -> Router {
    Router::new()
        .route("/public/health", get(system::health))
        .route("/actuator/health", get(system::health))
        .route("/api/whoami", get(system::whoami))
        .nest("/api/rules", rules::router())
        .fallback(system::not_found)
}
