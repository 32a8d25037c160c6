use std::sync::Arc;

use invcfg_infra::RuleService;
use invcfg_infra::rule_store::{InMemoryRuleStore, PostgresRuleStore, RuleStore, StoreError};

use crate::config::DatabaseConfig;

/// Store handle shared by every request.
pub type SharedRuleStore = Arc<dyn RuleStore>;

/// Application services (wired once at startup, shared across requests).
pub struct AppServices {
    rules: RuleService<SharedRuleStore>,
}

impl AppServices {
    pub fn new(store: SharedRuleStore) -> Self {
        Self {
            rules: RuleService::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRuleStore::new()))
    }

    pub fn rules(&self) -> &RuleService<SharedRuleStore> {
        &self.rules
    }
}

/// Wire services: Postgres when a database is configured, in-memory otherwise.
pub async fn build_services(database: Option<&DatabaseConfig>) -> Result<AppServices, StoreError> {
    let Some(db) = database else {
        tracing::info!("using in-memory rule store");
        return Ok(AppServices::in_memory());
    };

    tracing::info!(max_connections = db.max_connections, "connecting to postgres rule store");
    let store = PostgresRuleStore::connect(&db.url, db.max_connections).await?;
    store.ensure_schema().await?;
    Ok(AppServices::new(Arc::new(store)))
}
