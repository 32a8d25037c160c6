//! Inventory rule domain module.
//!
//! This crate contains the business rules for inventory rules, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod rule;

pub use rule::{
    InventoryRule, NewRule, RuleInput, ValidRuleInput, DESCRIPTION_MAX_CHARS, NAME_MAX_CHARS,
    NAME_MIN_CHARS, name_key,
};
