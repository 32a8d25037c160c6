//! Transactional rule store boundary.
//!
//! The trait describes the generated-query style access the service needs
//! (find by id/flag/name, exists-by-name, save, delete); backends decide how
//! atomicity is achieved.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryRuleStore;
pub use postgres::PostgresRuleStore;
pub use r#trait::{AuditAction, AuditEntry, RuleStore, RuleTransaction, StoreError};
