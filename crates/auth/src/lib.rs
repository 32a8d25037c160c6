//! `invcfg-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: the API layer
//! hands it a bearer token, a verb and a path, and gets back an identity and a
//! gate decision.

pub mod authorize;
pub mod claims;
pub mod identity;
pub mod jwt;
pub mod roles;

pub use authorize::{AccessPolicy, AuthzError, Capability, RouteRule, Verb, authorize};
pub use claims::{ClaimError, VerifiedClaims};
pub use identity::{Identity, IdentityConfig, IdentityError, resolve_identity};
pub use jwt::{Hs256JwtValidator, JwtValidator, TokenError};
pub use roles::Role;
