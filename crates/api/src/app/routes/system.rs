use axum::{extract::Extension, Json};
use chrono::Utc;

use invcfg_auth::Identity;

use crate::app::dto::HealthResponse;
use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok(Utc::now()))
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> Json<Identity> {
    Json(principal.identity().clone())
}

pub async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}
