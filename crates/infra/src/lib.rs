//! Infrastructure layer: rule persistence and the rule service.

pub mod rule_service;
pub mod rule_store;

pub use rule_service::{RuleService, RuleServiceError};
