use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Claims of a token whose signature and time window have already been
/// verified.
///
/// The claim set is kept open-ended: which claim carries the user id or the
/// roles is a deployment decision (see [`crate::IdentityConfig`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerifiedClaims(Map<String, Value>);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("claim '{0}' is absent")]
    Absent(String),

    #[error("claim '{0}' has an unexpected shape")]
    Malformed(String),
}

impl VerifiedClaims {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String value of a claim; `None` if absent, null or not a string.
    pub fn string(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// A claim holding a list of strings.
    ///
    /// A lone string is accepted as a one-element list. Anything else that is
    /// not an array of strings is `Malformed`.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>, ClaimError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Err(ClaimError::Absent(name.to_string())),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| ClaimError::Malformed(name.to_string()))
                })
                .collect(),
            Some(_) => Err(ClaimError::Malformed(name.to_string())),
        }
    }

    /// A space-delimited claim such as OAuth2 `scope`.
    pub fn space_delimited(&self, name: &str) -> Result<Vec<String>, ClaimError> {
        match self.0.get(name) {
            None | Some(Value::Null) => Err(ClaimError::Absent(name.to_string())),
            Some(Value::String(s)) => Ok(s.split_whitespace().map(str::to_string).collect()),
            Some(_) => Err(ClaimError::Malformed(name.to_string())),
        }
    }
}

impl From<Map<String, Value>> for VerifiedClaims {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}
