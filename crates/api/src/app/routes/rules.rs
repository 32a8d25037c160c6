use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};

use crate::app::dto::{self, RuleRequest, RuleResponse, SearchParams};
use crate::app::errors::ApiError;
use crate::app::extract::{RuleIdPath, ValidJson, ValidQuery};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rules).post(create_rule))
        .route("/active", get(list_active_rules))
        .route("/search", get(search_rules))
        .route("/:id", get(get_rule).put(update_rule).delete(delete_rule))
        .route("/:id/toggle", patch(toggle_rule))
}

pub async fn list_rules(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<RuleResponse>>, ApiError> {
    let rules = services.rules().list_all().await?;
    Ok(Json(dto::rule_list(rules)))
}

pub async fn get_rule(
    Extension(services): Extension<Arc<AppServices>>,
    RuleIdPath(id): RuleIdPath,
) -> Result<Json<RuleResponse>, ApiError> {
    let rule = services.rules().get_by_id(id).await?;
    Ok(Json(rule.into()))
}

pub async fn list_active_rules(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<RuleResponse>>, ApiError> {
    let rules = services.rules().list_active().await?;
    Ok(Json(dto::rule_list(rules)))
}

pub async fn search_rules(
    Extension(services): Extension<Arc<AppServices>>,
    ValidQuery(params): ValidQuery<SearchParams>,
) -> Result<Json<Vec<RuleResponse>>, ApiError> {
    let fragment = params.name.unwrap_or_default();
    let rules = services.rules().search_by_name(&fragment).await?;
    Ok(Json(dto::rule_list(rules)))
}

pub async fn create_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    ValidJson(body): ValidJson<RuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = services
        .rules()
        .create(body.into(), principal.user_id())
        .await?;
    Ok((StatusCode::CREATED, Json(RuleResponse::from(created))))
}

pub async fn update_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    RuleIdPath(id): RuleIdPath,
    ValidJson(body): ValidJson<RuleRequest>,
) -> Result<Json<RuleResponse>, ApiError> {
    let updated = services
        .rules()
        .update(id, body.into(), principal.user_id())
        .await?;
    Ok(Json(updated.into()))
}

pub async fn toggle_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    RuleIdPath(id): RuleIdPath,
) -> Result<Json<RuleResponse>, ApiError> {
    let toggled = services
        .rules()
        .toggle_active(id, principal.user_id())
        .await?;
    Ok(Json(toggled.into()))
}

pub async fn delete_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    RuleIdPath(id): RuleIdPath,
) -> Result<StatusCode, ApiError> {
    services.rules().delete(id, principal.user_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
