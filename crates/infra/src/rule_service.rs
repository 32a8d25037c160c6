//! Rule service (application-level orchestration).
//!
//! Every operation runs inside exactly one store transaction:
//!
//! ```text
//! input
//!   ↓
//! 1. Validate (pure, all violations at once)
//!   ↓
//! 2. Begin transaction
//!   ↓
//! 3. Look up / check uniqueness (case-insensitive)
//!   ↓
//! 4. Apply a pure transition (NewRule::new, overwritten, toggled)
//!   ↓
//! 5. Persist + audit entry, commit
//! ```
//!
//! The service holds no locks of its own. Write paths read the target row with
//! `find_by_id_for_update`, so concurrent toggles serialize instead of losing a
//! flip. A race between two creates with the same name is settled by the
//! store's uniqueness constraint, which surfaces here as `Conflict` just like
//! the pre-check does.

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use invcfg_core::{DomainError, FieldViolation, RuleId};
use invcfg_rules::{InventoryRule, NewRule, RuleInput};

use crate::rule_store::{AuditAction, AuditEntry, RuleStore, StoreError};

#[derive(Debug, Error)]
pub enum RuleServiceError {
    /// Input failed validation; every violated field is listed.
    #[error("validation failed")]
    Validation(Vec<FieldViolation>),
    /// Another rule already uses the name (case-insensitive).
    #[error("A rule with name '{0}' already exists")]
    Conflict(String),
    /// No rule with this id.
    #[error("Inventory rule with id {0} not found")]
    NotFound(RuleId),
    /// The store failed for a reason the caller cannot fix.
    #[error("rule store failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for RuleServiceError {
    fn from(value: StoreError) -> Self {
        RuleServiceError::Store(value)
    }
}

impl From<DomainError> for RuleServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(v) => RuleServiceError::Validation(v),
            DomainError::InvalidId(_) => RuleServiceError::Validation(vec![FieldViolation::new(
                "id",
                "must be a positive integer",
            )]),
        }
    }
}

/// Store-level unique violations become the same `Conflict` the pre-check raises.
fn conflict_on_unique(name: &str) -> impl FnOnce(StoreError) -> RuleServiceError + '_ {
    move |err| match err {
        StoreError::UniqueViolation(_) => RuleServiceError::Conflict(name.to_string()),
        other => RuleServiceError::Store(other),
    }
}

/// A row that vanished between lookup and write is reported as `NotFound`.
fn missing_as_not_found(id: RuleId) -> impl FnOnce(StoreError) -> RuleServiceError {
    move |err| match err {
        StoreError::Missing(_) => RuleServiceError::NotFound(id),
        other => RuleServiceError::Store(other),
    }
}

/// Business operations on inventory rules.
///
/// Generic over the store so tests run against [`crate::rule_store::InMemoryRuleStore`]
/// and production against [`crate::rule_store::PostgresRuleStore`].
#[derive(Debug)]
pub struct RuleService<S> {
    store: S,
}

impl<S> RuleService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> RuleService<S>
where
    S: RuleStore,
{
    #[instrument(skip(self), err)]
    pub async fn list_all(&self) -> Result<Vec<InventoryRule>, RuleServiceError> {
        tracing::debug!("fetching all inventory rules");
        let mut tx = self.store.begin().await?;
        let rules = tx.find_all().await?;
        tx.commit().await?;
        Ok(rules)
    }

    #[instrument(skip(self), fields(rule_id = %id), err)]
    pub async fn get_by_id(&self, id: RuleId) -> Result<InventoryRule, RuleServiceError> {
        tracing::debug!("fetching inventory rule");
        let mut tx = self.store.begin().await?;
        let rule = tx.find_by_id(id).await?.ok_or(RuleServiceError::NotFound(id))?;
        tx.commit().await?;
        Ok(rule)
    }

    #[instrument(skip(self), err)]
    pub async fn list_active(&self) -> Result<Vec<InventoryRule>, RuleServiceError> {
        tracing::debug!("fetching active inventory rules");
        self.list_by_active(true).await
    }

    #[instrument(skip(self), err)]
    pub async fn list_inactive(&self) -> Result<Vec<InventoryRule>, RuleServiceError> {
        tracing::debug!("fetching inactive inventory rules");
        self.list_by_active(false).await
    }

    async fn list_by_active(&self, active: bool) -> Result<Vec<InventoryRule>, RuleServiceError> {
        let mut tx = self.store.begin().await?;
        let rules = tx.find_by_active(active).await?;
        tx.commit().await?;
        Ok(rules)
    }

    #[instrument(skip(self), err)]
    pub async fn search_by_name(
        &self,
        fragment: &str,
    ) -> Result<Vec<InventoryRule>, RuleServiceError> {
        tracing::debug!("searching inventory rules by name");
        let mut tx = self.store.begin().await?;
        let rules = tx.find_by_name_containing_ignore_case(fragment).await?;
        tx.commit().await?;
        Ok(rules)
    }

    #[instrument(skip(self, input), fields(actor = %actor_id), err)]
    pub async fn create(
        &self,
        input: RuleInput,
        actor_id: &str,
    ) -> Result<InventoryRule, RuleServiceError> {
        let valid = input.validate()?;
        tracing::info!(name = %valid.name(), "creating inventory rule");

        let mut tx = self.store.begin().await?;
        if tx.exists_by_name_ignore_case(valid.name()).await? {
            return Err(RuleServiceError::Conflict(valid.name().to_string()));
        }

        let now = Utc::now();
        let name = valid.name().to_string();
        let created = tx
            .insert(NewRule::new(valid, actor_id, now))
            .await
            .map_err(conflict_on_unique(&name))?;
        tx.record_audit(AuditEntry::new(&created, AuditAction::Created, actor_id, now))
            .await?;
        tx.commit().await.map_err(conflict_on_unique(&name))?;

        tracing::info!(rule_id = %created.id, "created inventory rule");
        Ok(created)
    }

    #[instrument(skip(self, input), fields(rule_id = %id, actor = %actor_id), err)]
    pub async fn update(
        &self,
        id: RuleId,
        input: RuleInput,
        actor_id: &str,
    ) -> Result<InventoryRule, RuleServiceError> {
        tracing::info!("updating inventory rule");

        let mut tx = self.store.begin().await?;
        let existing = tx
            .find_by_id_for_update(id)
            .await?
            .ok_or(RuleServiceError::NotFound(id))?;

        let valid = input.validate()?;
        if let Some(other) = tx.find_by_name_ignore_case(valid.name()).await? {
            if other.id != id {
                return Err(RuleServiceError::Conflict(valid.name().to_string()));
            }
        }

        let now = Utc::now();
        let name = valid.name().to_string();
        let updated = existing.overwritten(valid, actor_id, now);
        let saved = tx.save(&updated).await.map_err(|e| match e {
            StoreError::Missing(_) => RuleServiceError::NotFound(id),
            other => conflict_on_unique(&name)(other),
        })?;
        tx.record_audit(AuditEntry::new(&saved, AuditAction::Updated, actor_id, now))
            .await?;
        tx.commit().await.map_err(conflict_on_unique(&name))?;

        tracing::info!("updated inventory rule");
        Ok(saved)
    }

    #[instrument(skip(self), fields(rule_id = %id, actor = %actor_id), err)]
    pub async fn toggle_active(
        &self,
        id: RuleId,
        actor_id: &str,
    ) -> Result<InventoryRule, RuleServiceError> {
        tracing::info!("toggling active status of inventory rule");

        let mut tx = self.store.begin().await?;
        let existing = tx
            .find_by_id_for_update(id)
            .await?
            .ok_or(RuleServiceError::NotFound(id))?;

        let now = Utc::now();
        let saved = tx
            .save(&existing.toggled(actor_id, now))
            .await
            .map_err(missing_as_not_found(id))?;
        tx.record_audit(AuditEntry::new(&saved, AuditAction::Toggled, actor_id, now))
            .await?;
        tx.commit().await?;

        tracing::info!(is_active = saved.is_active, "toggled inventory rule");
        Ok(saved)
    }

    #[instrument(skip(self), fields(rule_id = %id, actor = %actor_id), err)]
    pub async fn delete(&self, id: RuleId, actor_id: &str) -> Result<(), RuleServiceError> {
        tracing::info!("deleting inventory rule");

        let mut tx = self.store.begin().await?;
        let existing = tx
            .find_by_id_for_update(id)
            .await?
            .ok_or(RuleServiceError::NotFound(id))?;

        // Nothing of the row survives the delete; record who did it first.
        tracing::warn!(
            target: "audit",
            actor = %actor_id,
            rule_id = %existing.id,
            rule_name = %existing.name,
            "inventory rule deleted"
        );
        tx.record_audit(AuditEntry::new(&existing, AuditAction::Deleted, actor_id, Utc::now()))
            .await?;
        tx.delete(id).await.map_err(missing_as_not_found(id))?;
        tx.commit().await?;

        tracing::info!("deleted inventory rule");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::rule_store::{InMemoryRuleStore, RuleTransaction};

    fn service() -> RuleService<Arc<InMemoryRuleStore>> {
        RuleService::new(Arc::new(InMemoryRuleStore::new()))
    }

    fn input(name: &str) -> RuleInput {
        RuleInput {
            name: Some(name.to_string()),
            description: Some("x".to_string()),
            is_active: None,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let svc = service();
        let created = svc.create(input("Reorder"), "admin-1").await.unwrap();

        assert!(created.is_active);
        assert_eq!(created.updated_by, "admin-1");
        assert_eq!(created.created_at, created.updated_at);

        let fetched = svc.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn create_rejects_names_differing_only_by_case() {
        let svc = service();
        svc.create(input("Reorder"), "admin-1").await.unwrap();

        let err = svc.create(input("reorder"), "admin-1").await.unwrap_err();
        assert!(matches!(err, RuleServiceError::Conflict(ref n) if n == "reorder"));
        assert_eq!(svc.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_validates_before_touching_the_store() {
        let svc = service();
        let err = svc
            .create(
                RuleInput {
                    name: Some("x".to_string()),
                    description: Some("d".repeat(600)),
                    is_active: None,
                },
                "admin-1",
            )
            .await
            .unwrap_err();

        let RuleServiceError::Validation(v) = err else {
            panic!("expected validation error");
        };
        assert_eq!(v.len(), 2);
        assert!(svc.store().audit_log().await.is_empty());
    }

    #[tokio::test]
    async fn update_on_missing_id_is_not_found_even_with_invalid_input() {
        let svc = service();
        let err = svc
            .update(RuleId::new(99), RuleInput::default(), "admin-1")
            .await
            .unwrap_err();
        assert!(matches!(err, RuleServiceError::NotFound(id) if id == RuleId::new(99)));
    }

    #[tokio::test]
    async fn update_rejects_another_rules_name_but_allows_recasing_own() {
        let svc = service();
        let a = svc.create(input("Reorder"), "admin-1").await.unwrap();
        svc.create(input("Restock"), "admin-1").await.unwrap();

        let err = svc.update(a.id, input("RESTOCK"), "admin-2").await.unwrap_err();
        assert!(matches!(err, RuleServiceError::Conflict(_)));

        let renamed = svc.update(a.id, input("REORDER"), "admin-2").await.unwrap();
        assert_eq!(renamed.name, "REORDER");
        assert_eq!(renamed.updated_by, "admin-2");
        assert_eq!(renamed.created_at, a.created_at);
        assert!(renamed.updated_at >= a.updated_at);
    }

    #[tokio::test]
    async fn writes_move_updated_at_forward() {
        let svc = service();
        let rule = svc.create(input("Reorder"), "admin-1").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let updated = svc.update(rule.id, input("Restock"), "admin-1").await.unwrap();
        assert!(updated.updated_at > rule.updated_at);
        assert_eq!(updated.created_at, rule.created_at);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let toggled = svc.toggle_active(rule.id, "admin-1").await.unwrap();
        assert!(toggled.updated_at > updated.updated_at);
        assert_eq!(toggled.created_at, rule.created_at);
    }

    #[tokio::test]
    async fn toggle_twice_restores_state_and_tracks_last_actor() {
        let svc = service();
        let rule = svc.create(input("Reorder"), "admin-1").await.unwrap();

        let once = svc.toggle_active(rule.id, "alice").await.unwrap();
        assert!(!once.is_active);
        assert_eq!(once.updated_by, "alice");

        let twice = svc.toggle_active(rule.id, "bob").await.unwrap();
        assert_eq!(twice.is_active, rule.is_active);
        assert_eq!(twice.updated_by, "bob");
    }

    #[tokio::test]
    async fn delete_removes_and_audits_actor() {
        let svc = service();
        let rule = svc.create(input("Reorder"), "admin-1").await.unwrap();

        svc.delete(rule.id, "admin-2").await.unwrap();

        let err = svc.get_by_id(rule.id).await.unwrap_err();
        assert!(matches!(err, RuleServiceError::NotFound(_)));

        let audit = svc.store().audit_log().await;
        let deletion = audit
            .iter()
            .find(|e| e.action == AuditAction::Deleted)
            .expect("deletion audited");
        assert_eq!(deletion.actor, "admin-2");
        assert_eq!(deletion.rule_id, rule.id);
        assert_eq!(deletion.rule_name, "Reorder");
    }

    /// Store whose rows disappear between the locking read and the write, as
    /// when a concurrent delete commits first. Plain `find_by_id` fails so a
    /// write path that skips the row lock is caught too.
    struct VanishingStore {
        inner: InMemoryRuleStore,
    }

    struct VanishingTransaction<'a> {
        inner: Box<dyn RuleTransaction + 'a>,
    }

    #[async_trait::async_trait]
    impl RuleStore for VanishingStore {
        async fn begin(&self) -> Result<Box<dyn RuleTransaction + '_>, StoreError> {
            let inner = self.inner.begin().await?;
            Ok(Box::new(VanishingTransaction { inner }))
        }
    }

    #[async_trait::async_trait]
    impl RuleTransaction for VanishingTransaction<'_> {
        async fn find_all(&mut self) -> Result<Vec<InventoryRule>, StoreError> {
            self.inner.find_all().await
        }

        async fn find_by_id(&mut self, _id: RuleId) -> Result<Option<InventoryRule>, StoreError> {
            Err(StoreError::Backend("unlocked read on a write path".into()))
        }

        async fn find_by_id_for_update(
            &mut self,
            id: RuleId,
        ) -> Result<Option<InventoryRule>, StoreError> {
            self.inner.find_by_id_for_update(id).await
        }

        async fn find_by_active(&mut self, active: bool) -> Result<Vec<InventoryRule>, StoreError> {
            self.inner.find_by_active(active).await
        }

        async fn find_by_name_ignore_case(
            &mut self,
            name: &str,
        ) -> Result<Option<InventoryRule>, StoreError> {
            self.inner.find_by_name_ignore_case(name).await
        }

        async fn find_by_name_containing_ignore_case(
            &mut self,
            fragment: &str,
        ) -> Result<Vec<InventoryRule>, StoreError> {
            self.inner.find_by_name_containing_ignore_case(fragment).await
        }

        async fn exists_by_name_ignore_case(&mut self, name: &str) -> Result<bool, StoreError> {
            self.inner.exists_by_name_ignore_case(name).await
        }

        async fn insert(&mut self, rule: NewRule) -> Result<InventoryRule, StoreError> {
            self.inner.insert(rule).await
        }

        async fn save(&mut self, rule: &InventoryRule) -> Result<InventoryRule, StoreError> {
            Err(StoreError::Missing(format!("inventory_rules.id {}", rule.id)))
        }

        async fn delete(&mut self, id: RuleId) -> Result<(), StoreError> {
            Err(StoreError::Missing(format!("inventory_rules.id {id}")))
        }

        async fn record_audit(&mut self, entry: AuditEntry) -> Result<(), StoreError> {
            self.inner.record_audit(entry).await
        }

        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.commit().await
        }
    }

    #[tokio::test]
    async fn row_deleted_under_a_write_is_not_found() {
        let svc = RuleService::new(VanishingStore {
            inner: InMemoryRuleStore::new(),
        });
        let rule = svc.create(input("Reorder"), "admin-1").await.unwrap();

        assert!(matches!(
            svc.update(rule.id, input("Restock"), "admin-1").await,
            Err(RuleServiceError::NotFound(id)) if id == rule.id
        ));
        assert!(matches!(
            svc.toggle_active(rule.id, "admin-1").await,
            Err(RuleServiceError::NotFound(id)) if id == rule.id
        ));
        assert!(matches!(
            svc.delete(rule.id, "admin-1").await,
            Err(RuleServiceError::NotFound(id)) if id == rule.id
        ));
    }

    #[tokio::test]
    async fn concurrent_toggles_never_lose_a_flip() {
        let svc = Arc::new(service());
        let rule = svc.create(input("Reorder"), "admin-1").await.unwrap();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.toggle_active(rule.id, "admin-1").await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        // An even number of flips lands back on the starting state.
        assert_eq!(svc.get_by_id(rule.id).await.unwrap().is_active, rule.is_active);
    }

    #[tokio::test]
    async fn delete_and_toggle_on_missing_id_are_not_found() {
        let svc = service();
        assert!(matches!(
            svc.delete(RuleId::new(5), "admin-1").await,
            Err(RuleServiceError::NotFound(_))
        ));
        assert!(matches!(
            svc.toggle_active(RuleId::new(5), "admin-1").await,
            Err(RuleServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn active_inactive_and_search_filters() {
        let svc = service();
        let a = svc.create(input("Weekly Reorder"), "admin-1").await.unwrap();
        svc.create(input("Restock"), "admin-1").await.unwrap();
        svc.toggle_active(a.id, "admin-1").await.unwrap();

        let active = svc.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Restock");

        let inactive = svc.list_inactive().await.unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].id, a.id);

        let hits = svc.search_by_name("reORD").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(svc.search_by_name("").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_creates_with_same_name_admit_one() {
        let svc = Arc::new(service());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let svc = svc.clone();
                let name = if i % 2 == 0 { "Reorder" } else { "REORDER" };
                tokio::spawn(async move { svc.create(input(name), "admin-1").await })
            })
            .collect();

        let mut created = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => created += 1,
                Err(RuleServiceError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(created, 1);
    }
}
