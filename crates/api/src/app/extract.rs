//! Extractors whose rejections use the common error body.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use invcfg_core::RuleId;

use crate::app::errors::ApiError;

/// JSON body; malformed input is a 400 validation error on `body`.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        axum::Json::<T>::from_request(req, state)
            .await
            .map(|axum::Json(value)| ValidJson(value))
            .map_err(|rejection| ApiError::validation("body", rejection.body_text()))
    }
}

/// Query string; an undecodable one is a 400 validation error on `query`.
#[derive(Debug, Clone)]
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ValidQuery(value))
            .map_err(|rejection| ApiError::validation("query", rejection.body_text()))
    }
}

/// `{id}` path segment parsed as a [`RuleId`].
#[derive(Debug, Copy, Clone)]
pub struct RuleIdPath(pub RuleId);

#[async_trait]
impl<S> FromRequestParts<S> for RuleIdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::validation("id", "must be a positive integer"))?;

        raw.parse::<RuleId>()
            .map(RuleIdPath)
            .map_err(|_| ApiError::validation("id", "must be a positive integer"))
    }
}
