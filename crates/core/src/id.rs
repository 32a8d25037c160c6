//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of an inventory rule.
///
/// Assigned by the store on first insert (monotonically increasing) and never
/// changed afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(i64);

impl RuleId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for RuleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for RuleId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<RuleId> for i64 {
    fn from(value: RuleId) -> Self {
        value.0
    }
}

impl FromStr for RuleId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|e| DomainError::invalid_id(format!("RuleId: {e}")))?;
        if value <= 0 {
            return Err(DomainError::invalid_id("RuleId: must be a positive integer"));
        }
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_integers_only() {
        assert_eq!("42".parse::<RuleId>().unwrap(), RuleId::new(42));
        assert!("0".parse::<RuleId>().is_err());
        assert!("-3".parse::<RuleId>().is_err());
        assert!("abc".parse::<RuleId>().is_err());
    }
}
