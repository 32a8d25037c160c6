use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use invcfg_auth::{
    AccessPolicy, Identity, IdentityConfig, JwtValidator, Verb, authorize, resolve_identity,
};

use crate::app::errors::{ApiError, ErrorBody};
use crate::context::{PrincipalContext, RequestId};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub identity: Arc<IdentityConfig>,
    pub policy: Arc<AccessPolicy>,
}

/// Resolve the caller (if any) and gate the request against the access policy.
///
/// A missing, malformed or unverifiable token is treated as "no identity":
/// Public routes still pass, everything else gets 401.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let verb = Verb::parse(req.method().as_str());
    let identity = authenticate(&state, req.headers());

    let granted = authorize(&state.policy, verb, req.uri().path(), identity.as_ref())
        .map_err(|e| {
            tracing::debug!(reason = %e, "request rejected by access policy");
            ApiError::from(e)
        })?;
    tracing::debug!(capability = ?granted, "request authorized");

    if let Some(identity) = identity {
        req.extensions_mut().insert(PrincipalContext::new(identity));
    }

    Ok(next.run(req).await)
}

fn authenticate(state: &AuthState, headers: &HeaderMap) -> Option<Identity> {
    let token = extract_bearer(headers)?;

    let claims = state
        .jwt
        .validate(token)
        .map_err(|e| tracing::debug!(error = %e, "bearer token rejected"))
        .ok()?;

    resolve_identity(&state.identity, Some(&claims))
        .map_err(|e| tracing::debug!(error = %e, "token carries no usable identity"))
        .ok()
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Run the request inside an `http_request` span and echo its id back.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = RequestId::new();
    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    req.extensions_mut().insert(request_id);

    let started = Instant::now();
    let mut res = next.run(req).instrument(span.clone()).await;

    span.in_scope(|| {
        tracing::info!(
            status = res.status().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );
    });

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

/// Fill in `path` on error bodies, and give router-level 404/405 responses
/// (which come back with an empty body) the same error shape.
pub async fn error_body_middleware(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let mut res = next.run(req).await;

    let body = match res.extensions_mut().remove::<ErrorBody>() {
        Some(mut body) => {
            body.path = path;
            body
        }
        None if res.headers().contains_key(header::CONTENT_TYPE) => return res,
        None => match res.status() {
            StatusCode::NOT_FOUND => ApiError::RouteNotFound.body(path),
            StatusCode::METHOD_NOT_ALLOWED => ApiError::MethodNotAllowed.body(path),
            _ => return res,
        },
    };

    let (mut parts, _) = res.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    match serde_json::to_vec(&body) {
        Ok(bytes) => Response::from_parts(parts, Body::from(bytes)),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode error body");
            Response::from_parts(parts, Body::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_bearer(&headers("Bearer  abc ")), Some("abc"));
    }

    #[test]
    fn non_bearer_or_empty_is_ignored() {
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
        assert_eq!(extract_bearer(&headers("Basic dXNlcjpwdw==")), None);
        assert_eq!(extract_bearer(&headers("Bearer ")), None);
    }
}
