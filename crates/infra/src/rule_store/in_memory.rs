use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};

use invcfg_core::{Entity, RuleId};
use invcfg_rules::{InventoryRule, NewRule, name_key};

use super::r#trait::{AuditEntry, RuleStore, RuleTransaction, StoreError};

#[derive(Debug, Clone, Default)]
struct Rows {
    rules: BTreeMap<RuleId, InventoryRule>,
    last_id: i64,
}

impl Rows {
    fn name_taken(&self, name: &str, except: Option<RuleId>) -> bool {
        let key = name_key(name);
        self.rules
            .values()
            .any(|r| Some(r.id()) != except && name_key(&r.name) == key)
    }
}

#[derive(Debug, Default)]
struct Table {
    rows: Rows,
    audit: Vec<AuditEntry>,
}

/// In-memory rule store.
///
/// Intended for tests/dev. A transaction holds the table lock until it is
/// committed or dropped, so transactions are fully serialized.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    table: Mutex<Table>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the committed audit trail.
    pub async fn audit_log(&self) -> Vec<AuditEntry> {
        self.table.lock().await.audit.clone()
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn begin(&self) -> Result<Box<dyn RuleTransaction + '_>, StoreError> {
        let guard = self.table.lock().await;
        // The audit trail is append-only, so only the rows are staged.
        let staged = guard.rows.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            staged,
            pending_audit: Vec::new(),
        }))
    }
}

struct InMemoryTransaction<'a> {
    guard: MutexGuard<'a, Table>,
    staged: Rows,
    pending_audit: Vec<AuditEntry>,
}

impl InMemoryTransaction<'_> {
    fn filtered(&self, pred: impl Fn(&InventoryRule) -> bool) -> Vec<InventoryRule> {
        self.staged.rules.values().filter(|r| pred(r)).cloned().collect()
    }
}

#[async_trait]
impl RuleTransaction for InMemoryTransaction<'_> {
    async fn find_all(&mut self) -> Result<Vec<InventoryRule>, StoreError> {
        Ok(self.filtered(|_| true))
    }

    async fn find_by_id(&mut self, id: RuleId) -> Result<Option<InventoryRule>, StoreError> {
        Ok(self.staged.rules.get(&id).cloned())
    }

    async fn find_by_id_for_update(
        &mut self,
        id: RuleId,
    ) -> Result<Option<InventoryRule>, StoreError> {
        // The table lock is already exclusive for the whole transaction.
        self.find_by_id(id).await
    }

    async fn find_by_active(&mut self, active: bool) -> Result<Vec<InventoryRule>, StoreError> {
        Ok(self.filtered(|r| r.is_active == active))
    }

    async fn find_by_name_ignore_case(
        &mut self,
        name: &str,
    ) -> Result<Option<InventoryRule>, StoreError> {
        Ok(self.staged.rules.values().find(|r| r.has_name(name)).cloned())
    }

    async fn find_by_name_containing_ignore_case(
        &mut self,
        fragment: &str,
    ) -> Result<Vec<InventoryRule>, StoreError> {
        let needle = name_key(fragment);
        Ok(self.filtered(|r| name_key(&r.name).contains(&needle)))
    }

    async fn exists_by_name_ignore_case(&mut self, name: &str) -> Result<bool, StoreError> {
        Ok(self.staged.name_taken(name, None))
    }

    async fn insert(&mut self, rule: NewRule) -> Result<InventoryRule, StoreError> {
        if self.staged.name_taken(&rule.name, None) {
            return Err(StoreError::UniqueViolation(format!(
                "inventory_rules.name '{}'",
                rule.name
            )));
        }

        self.staged.last_id += 1;
        let stored = rule.with_id(RuleId::new(self.staged.last_id));
        self.staged.rules.insert(stored.id(), stored.clone());
        Ok(stored)
    }

    async fn save(&mut self, rule: &InventoryRule) -> Result<InventoryRule, StoreError> {
        if !self.staged.rules.contains_key(&rule.id()) {
            return Err(StoreError::Missing(format!("inventory_rules.id {}", rule.id())));
        }
        if self.staged.name_taken(&rule.name, Some(rule.id())) {
            return Err(StoreError::UniqueViolation(format!(
                "inventory_rules.name '{}'",
                rule.name
            )));
        }

        self.staged.rules.insert(rule.id(), rule.clone());
        Ok(rule.clone())
    }

    async fn delete(&mut self, id: RuleId) -> Result<(), StoreError> {
        self.staged
            .rules
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::Missing(format!("inventory_rules.id {id}")))
    }

    async fn record_audit(&mut self, entry: AuditEntry) -> Result<(), StoreError> {
        self.pending_audit.push(entry);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction {
            mut guard,
            staged,
            pending_audit,
        } = *self;
        guard.rows = staged;
        guard.audit.extend(pending_audit);
        Ok(())
    }
}
