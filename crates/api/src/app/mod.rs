//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the rule service
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `extract.rs`: extractors that reject with the common error body
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use invcfg_auth::{AccessPolicy, Hs256JwtValidator};
use invcfg_infra::rule_store::StoreError;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod extract;
pub mod routes;
pub mod services;

/// Build the full HTTP router from configuration (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> Result<Router, StoreError> {
    let services = services::build_services(config.database.as_ref()).await?;
    Ok(router(config, Arc::new(services)))
}

/// Build the router around already-wired services.
pub fn router(config: &AppConfig, services: Arc<services::AppServices>) -> Router {
    let mut jwt = Hs256JwtValidator::new(config.jwt_secret.as_bytes());
    if let Some(issuer) = &config.jwt_issuer {
        jwt = jwt.with_issuer(issuer);
    }
    if let Some(audience) = &config.jwt_audience {
        jwt = jwt.with_audience(audience);
    }

    let auth_state = middleware::AuthState {
        jwt: Arc::new(jwt),
        identity: Arc::new(config.identity.clone()),
        policy: Arc::new(AccessPolicy::inventory_rules()),
    };

    // Layers run outermost-last: request span, then error bodies, then the gate.
    routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_id_middleware))
                .layer(axum::middleware::from_fn(middleware::error_body_middleware)),
        )
}
