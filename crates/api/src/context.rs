use invcfg_auth::Identity;
use uuid::Uuid;

/// Principal context for a request (the authenticated identity).
///
/// Inserted by the auth middleware whenever a valid token was presented, so
/// handlers behind an Admin or Authenticated gate can rely on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    identity: Identity,
}

impl PrincipalContext {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    /// The actor id recorded on writes.
    pub fn user_id(&self) -> &str {
        self.identity.user_id()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

/// Correlation id for one HTTP request (UUIDv7, echoed as `x-request-id`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
