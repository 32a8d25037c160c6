//! Token identity resolution: who is calling, and may they write.

use serde::Serialize;
use thiserror::Error;

use crate::{Role, VerifiedClaims};

/// Claims consulted for the username, in priority order.
const USERNAME_CLAIMS: [&str; 3] = ["username", "email", "preferred_username"];

const SCOPE_CLAIM: &str = "scope";

/// Which claims carry identity information, and which role grants write access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub user_id_claim: String,
    pub roles_claim: String,
    pub admin_role: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_id_claim: "sub".to_string(),
            roles_claim: "cognito:groups".to_string(),
            admin_role: "ADMIN".to_string(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("no verified token in request context")]
    NoToken,

    #[error("user id claim '{0}' not found in token")]
    IdentityMissing(String),
}

/// The authenticated caller, derived from verified claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub username: Option<String>,
    pub roles: Vec<Role>,
    pub scopes: Vec<String>,
    pub is_admin: bool,
}

impl Identity {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }
}

/// Resolve the caller's identity from the verified claims of the current
/// request.
///
/// Only the user id is mandatory. An absent or malformed roles (or scope)
/// claim yields an empty list rather than an error.
pub fn resolve_identity(
    config: &IdentityConfig,
    claims: Option<&VerifiedClaims>,
) -> Result<Identity, IdentityError> {
    let claims = claims.ok_or(IdentityError::NoToken)?;

    let user_id = claims
        .string(&config.user_id_claim)
        .ok_or_else(|| IdentityError::IdentityMissing(config.user_id_claim.clone()))?
        .to_string();

    let roles: Vec<Role> = claims
        .string_list(&config.roles_claim)
        .unwrap_or_else(|e| {
            tracing::debug!(error = %e, "roles claim unusable; treating as no roles");
            Vec::new()
        })
        .into_iter()
        .map(Role::new)
        .collect();

    let scopes = claims.space_delimited(SCOPE_CLAIM).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "scope claim unusable; treating as no scopes");
        Vec::new()
    });

    let is_admin = roles.iter().any(|r| r.matches_ignore_case(&config.admin_role));

    let username = USERNAME_CLAIMS
        .iter()
        .find_map(|name| claims.string(name))
        .map(str::to_string);

    Ok(Identity {
        user_id,
        username,
        roles,
        scopes,
        is_admin,
    })
}
