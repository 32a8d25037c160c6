//! Process configuration, read once from the environment at startup.
//!
//! | Variable | Default |
//! |---|---|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `JWT_SECRET` | insecure dev secret (warns) |
//! | `JWT_ISSUER` / `JWT_AUDIENCE` | unchecked |
//! | `USE_PERSISTENT_STORES` + `DATABASE_URL` | in-memory store |
//! | `DATABASE_MAX_CONNECTIONS` | `5` |
//! | `APP_SECURITY_USER_ID_CLAIM` | `sub` |
//! | `APP_SECURITY_ROLES_CLAIM` | `cognito:groups` |
//! | `APP_SECURITY_ADMIN_ROLE` | `ADMIN` |

use std::net::SocketAddr;

use thiserror::Error;

use invcfg_auth::IdentityConfig;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a socket address, got '{value}'")]
    InvalidAddr { var: &'static str, value: String },

    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
}

/// Postgres connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    /// `Some` selects the Postgres store; `None` the in-memory one.
    pub database: Option<DatabaseConfig>,
    pub identity: IdentityConfig,
}

impl AppConfig {
    /// In-memory configuration with the given signing secret (tests, local runs).
    pub fn with_jwt_secret(secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: secret.into(),
            jwt_issuer: None,
            jwt_audience: None,
            database: None,
            identity: IdentityConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_raw = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddr {
                var: "BIND_ADDR",
                value: bind_raw.clone(),
            })?;

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        var: "DATABASE_MAX_CONNECTIONS",
                        value: raw,
                    });
                }
            },
        };

        let persistent = var("USE_PERSISTENT_STORES")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let database = match (persistent, var("DATABASE_URL")) {
            (true, Some(url)) => Some(DatabaseConfig {
                url,
                max_connections,
            }),
            (true, None) => {
                tracing::warn!("USE_PERSISTENT_STORES=true but DATABASE_URL not set; using in-memory store");
                None
            }
            (false, _) => None,
        };

        let defaults = IdentityConfig::default();
        let identity = IdentityConfig {
            user_id_claim: var("APP_SECURITY_USER_ID_CLAIM").unwrap_or(defaults.user_id_claim),
            roles_claim: var("APP_SECURITY_ROLES_CLAIM").unwrap_or(defaults.roles_claim),
            admin_role: var("APP_SECURITY_ADMIN_ROLE").unwrap_or(defaults.admin_role),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_issuer: var("JWT_ISSUER"),
            jwt_audience: var("JWT_AUDIENCE"),
            database,
            identity,
        })
    }
}
