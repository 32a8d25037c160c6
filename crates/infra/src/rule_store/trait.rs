use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use invcfg_core::RuleId;
use invcfg_rules::{InventoryRule, NewRule};

/// Rule store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors. The one
/// exception is `UniqueViolation`: the store enforces name uniqueness on its
/// own so that two racing writers cannot both get past the service pre-check.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("row not found: {0}")]
    Missing(String),

    #[error("transaction already finished")]
    TransactionClosed,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// What happened to a rule, for the audit trail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Updated,
    Toggled,
    Deleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Updated => "updated",
            AuditAction::Toggled => "toggled",
            AuditAction::Deleted => "deleted",
        }
    }
}

/// One row of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub action: AuditAction,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(rule: &InventoryRule, action: AuditAction, actor: &str, at: DateTime<Utc>) -> Self {
        Self {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            action,
            actor: actor.to_string(),
            occurred_at: at,
        }
    }
}

/// Relational store for inventory rules.
///
/// Every read and write goes through a [`RuleTransaction`]; nothing is
/// visible to other transactions until `commit`, and dropping an uncommitted
/// transaction discards its writes.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn RuleTransaction + '_>, StoreError>;
}

#[async_trait]
impl<S> RuleStore for Arc<S>
where
    S: RuleStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn RuleTransaction + '_>, StoreError> {
        (**self).begin().await
    }
}

/// A unit of work against the rule store.
///
/// Lists are returned in ascending id order (insertion order).
#[async_trait]
pub trait RuleTransaction: Send {
    async fn find_all(&mut self) -> Result<Vec<InventoryRule>, StoreError>;

    async fn find_by_id(&mut self, id: RuleId) -> Result<Option<InventoryRule>, StoreError>;

    /// Like `find_by_id`, but the row stays locked against other writers
    /// until this transaction ends. Write paths read through this.
    async fn find_by_id_for_update(
        &mut self,
        id: RuleId,
    ) -> Result<Option<InventoryRule>, StoreError>;

    async fn find_by_active(&mut self, active: bool) -> Result<Vec<InventoryRule>, StoreError>;

    /// Exact, case-insensitive name lookup.
    async fn find_by_name_ignore_case(
        &mut self,
        name: &str,
    ) -> Result<Option<InventoryRule>, StoreError>;

    /// Case-insensitive substring search; an empty fragment matches everything.
    async fn find_by_name_containing_ignore_case(
        &mut self,
        fragment: &str,
    ) -> Result<Vec<InventoryRule>, StoreError>;

    async fn exists_by_name_ignore_case(&mut self, name: &str) -> Result<bool, StoreError>;

    /// Insert a new rule and return it with its assigned id.
    async fn insert(&mut self, rule: NewRule) -> Result<InventoryRule, StoreError>;

    /// Overwrite an existing rule (matched by id).
    async fn save(&mut self, rule: &InventoryRule) -> Result<InventoryRule, StoreError>;

    async fn delete(&mut self, id: RuleId) -> Result<(), StoreError>;

    async fn record_audit(&mut self, entry: AuditEntry) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
