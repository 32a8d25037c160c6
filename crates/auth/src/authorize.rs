//! Route-level authorization gate.
//!
//! An ordered table of `(verb, path pattern) -> capability` rules is evaluated
//! top to bottom; the first match governs. The decision needs nothing but the
//! already-resolved [`Identity`], so it runs before any handler or store call.

use serde::Serialize;
use thiserror::Error;

use crate::Identity;

/// HTTP verb, decoupled from any HTTP crate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Verb {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Other,
}

impl Verb {
    pub fn parse(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Verb::Get,
            "HEAD" => Verb::Head,
            "POST" => Verb::Post,
            "PUT" => Verb::Put,
            "PATCH" => Verb::Patch,
            "DELETE" => Verb::Delete,
            "OPTIONS" => Verb::Options,
            _ => Verb::Other,
        }
    }
}

/// Access level a route requires.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Public,
    Authenticated,
    Admin,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthorized,

    #[error("access denied: admin role required")]
    Forbidden,
}

/// One row of the routing table. An empty `verbs` list matches every verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub verbs: Vec<Verb>,
    pub pattern: String,
    pub capability: Capability,
}

impl RouteRule {
    pub fn any_verb(pattern: impl Into<String>, capability: Capability) -> Self {
        Self {
            verbs: Vec::new(),
            pattern: pattern.into(),
            capability,
        }
    }

    pub fn verbs(verbs: &[Verb], pattern: impl Into<String>, capability: Capability) -> Self {
        Self {
            verbs: verbs.to_vec(),
            pattern: pattern.into(),
            capability,
        }
    }

    pub fn matches(&self, verb: Verb, path: &str) -> bool {
        (self.verbs.is_empty() || self.verbs.contains(&verb)) && pattern_matches(&self.pattern, path)
    }
}

/// Ordered routing table plus the fallback for unmatched requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    rules: Vec<RouteRule>,
    fallback: Capability,
}

impl AccessPolicy {
    pub fn new(rules: Vec<RouteRule>, fallback: Capability) -> Self {
        Self { rules, fallback }
    }

    /// The service's routing table.
    pub fn inventory_rules() -> Self {
        use Capability::*;
        use Verb::*;

        let writes = [Post, Put, Patch, Delete];
        Self::new(
            vec![
                RouteRule::any_verb("/public/**", Public),
                RouteRule::any_verb("/actuator/health", Public),
                RouteRule::any_verb("/error", Public),
                RouteRule::verbs(&writes, "/api/rules/**", Admin),
                RouteRule::verbs(&[Get], "/api/**", Authenticated),
            ],
            Authenticated,
        )
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Capability required for `verb path` (first matching rule wins).
    pub fn required(&self, verb: Verb, path: &str) -> Capability {
        self.rules
            .iter()
            .find(|r| r.matches(verb, path))
            .map(|r| r.capability)
            .unwrap_or(self.fallback)
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::inventory_rules()
    }
}

/// Gate a request: `Ok` with the capability that was satisfied, or the
/// reason it was rejected.
///
/// - No IO
/// - No claim parsing (the identity is already resolved)
pub fn authorize(
    policy: &AccessPolicy,
    verb: Verb,
    path: &str,
    identity: Option<&Identity>,
) -> Result<Capability, AuthzError> {
    let required = policy.required(verb, path);
    match (required, identity) {
        (Capability::Public, _) => Ok(required),
        (_, None) => Err(AuthzError::Unauthorized),
        (Capability::Authenticated, Some(_)) => Ok(required),
        (Capability::Admin, Some(id)) if id.is_admin() => Ok(required),
        (Capability::Admin, Some(_)) => Err(AuthzError::Forbidden),
    }
}

/// Literal segment matching; a trailing `/**` matches the prefix itself and
/// anything below it. Trailing slashes are ignored on both sides.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let path_segments: Vec<&str> = segments(path).collect();

    if let Some(prefix) = pattern.strip_suffix("/**") {
        let prefix_segments: Vec<&str> = segments(prefix).collect();
        return path_segments.len() >= prefix_segments.len()
            && prefix_segments
                .iter()
                .zip(&path_segments)
                .all(|(p, s)| p == s);
    }

    segments(pattern).eq(path_segments.into_iter())
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
