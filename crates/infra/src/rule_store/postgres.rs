//! Postgres-backed rule store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `UniqueViolation` | Two writers raced for the same (case-folded) name |
//! | Database (check violation) | `23514` | `Backend` | `updated_at < created_at` slipped through |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed | N/A | `Backend` | Connection pool was closed |
//! | Other | N/A | `Backend` | Network errors, connection failures, etc. |
//!
//! ## Thread Safety
//!
//! `PostgresRuleStore` is `Send + Sync`; the SQLx pool handles connection
//! sharing. Each [`RuleTransaction`] owns one pooled connection for its
//! lifetime.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use invcfg_core::RuleId;
use invcfg_rules::{InventoryRule, NewRule};

use super::r#trait::{AuditEntry, RuleStore, RuleTransaction, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_inventory_rules.sql");

const RULE_COLUMNS: &str =
    "id, name, description, is_active, updated_by, created_at, updated_at";

/// Postgres-backed rule store.
///
/// Name uniqueness is enforced twice: by the service pre-check and by the
/// unique index on `lower(name)`, which settles concurrent creates.
#[derive(Debug, Clone)]
pub struct PostgresRuleStore {
    pool: PgPool,
}

impl PostgresRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl RuleStore for PostgresRuleStore {
    async fn begin(&self) -> Result<Box<dyn RuleTransaction + '_>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn fetch_one_rule(
        &mut self,
        operation: &str,
        sql: &str,
        id: RuleId,
    ) -> Result<Option<InventoryRule>, StoreError> {
        let row = sqlx::query(sql)
            .bind(id.value())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        row.as_ref()
            .map(rule_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn fetch_rules(
        &mut self,
        operation: &str,
        sql: &str,
        bind: Option<BindValue<'_>>,
    ) -> Result<Vec<InventoryRule>, StoreError> {
        let mut query = sqlx::query(sql);
        query = match bind {
            Some(BindValue::Bool(b)) => query.bind(b),
            Some(BindValue::Text(s)) => query.bind(s.to_string()),
            None => query,
        };

        let rows = query
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        rows.iter()
            .map(|row| rule_from_row(row).map_err(|e| map_sqlx_error(operation, e)))
            .collect()
    }
}

enum BindValue<'a> {
    Bool(bool),
    Text(&'a str),
}

#[async_trait]
impl RuleTransaction for PostgresTransaction {
    async fn find_all(&mut self) -> Result<Vec<InventoryRule>, StoreError> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM inventory_rules ORDER BY id ASC");
        self.fetch_rules("find_all", &sql, None).await
    }

    async fn find_by_id(&mut self, id: RuleId) -> Result<Option<InventoryRule>, StoreError> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM inventory_rules WHERE id = $1");
        self.fetch_one_rule("find_by_id", &sql, id).await
    }

    async fn find_by_id_for_update(
        &mut self,
        id: RuleId,
    ) -> Result<Option<InventoryRule>, StoreError> {
        // Row lock: a concurrent toggle waits and then reads the flipped value,
        // a concurrent delete makes this return `None`.
        let sql = format!("SELECT {RULE_COLUMNS} FROM inventory_rules WHERE id = $1 FOR UPDATE");
        self.fetch_one_rule("find_by_id_for_update", &sql, id).await
    }

    async fn find_by_active(&mut self, active: bool) -> Result<Vec<InventoryRule>, StoreError> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM inventory_rules WHERE is_active = $1 ORDER BY id ASC"
        );
        self.fetch_rules("find_by_active", &sql, Some(BindValue::Bool(active)))
            .await
    }

    async fn find_by_name_ignore_case(
        &mut self,
        name: &str,
    ) -> Result<Option<InventoryRule>, StoreError> {
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM inventory_rules WHERE lower(name) = lower($1) LIMIT 1"
        );
        let mut rules = self
            .fetch_rules("find_by_name_ignore_case", &sql, Some(BindValue::Text(name)))
            .await?;
        Ok(rules.pop())
    }

    async fn find_by_name_containing_ignore_case(
        &mut self,
        fragment: &str,
    ) -> Result<Vec<InventoryRule>, StoreError> {
        // strpos avoids having to escape LIKE wildcards in the fragment.
        let sql = format!(
            "SELECT {RULE_COLUMNS} FROM inventory_rules \
             WHERE strpos(lower(name), lower($1)) > 0 ORDER BY id ASC"
        );
        self.fetch_rules(
            "find_by_name_containing_ignore_case",
            &sql,
            Some(BindValue::Text(fragment)),
        )
        .await
    }

    async fn exists_by_name_ignore_case(&mut self, name: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM inventory_rules WHERE lower(name) = lower($1)) AS taken",
        )
        .bind(name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("exists_by_name_ignore_case", e))?;

        row.try_get("taken")
            .map_err(|e| map_sqlx_error("exists_by_name_ignore_case", e))
    }

    async fn insert(&mut self, rule: NewRule) -> Result<InventoryRule, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO inventory_rules (name, description, is_active, updated_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RULE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&rule.name)
            .bind(&rule.description)
            .bind(rule.is_active)
            .bind(&rule.updated_by)
            .bind(rule.created_at)
            .bind(rule.updated_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert", e))?;

        rule_from_row(&row).map_err(|e| map_sqlx_error("insert", e))
    }

    async fn save(&mut self, rule: &InventoryRule) -> Result<InventoryRule, StoreError> {
        let sql = format!(
            r#"
            UPDATE inventory_rules
            SET name = $2, description = $3, is_active = $4, updated_by = $5, updated_at = $6
            WHERE id = $1
            RETURNING {RULE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(rule.id.value())
            .bind(&rule.name)
            .bind(&rule.description)
            .bind(rule.is_active)
            .bind(&rule.updated_by)
            .bind(rule.updated_at)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("save", e))?
            .ok_or_else(|| StoreError::Missing(format!("inventory_rules.id {}", rule.id)))?;

        rule_from_row(&row).map_err(|e| map_sqlx_error("save", e))
    }

    async fn delete(&mut self, id: RuleId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM inventory_rules WHERE id = $1")
            .bind(id.value())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(format!("inventory_rules.id {id}")));
        }
        Ok(())
    }

    async fn record_audit(&mut self, entry: AuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_rule_audit (rule_id, rule_name, action, actor, occurred_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.rule_id.value())
        .bind(&entry.rule_name)
        .bind(entry.action.as_str())
        .bind(&entry.actor)
        .bind(entry.occurred_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("record_audit", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

fn rule_from_row(row: &PgRow) -> Result<InventoryRule, sqlx::Error> {
    Ok(InventoryRule {
        id: RuleId::new(row.try_get::<i64, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        updated_by: row.try_get("updated_by")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_columns_are_unbounded() {
        // Subject claims have no length limit; a long one must not fail the write.
        assert!(SCHEMA.contains("updated_by  TEXT"));
        assert!(SCHEMA.contains("actor       TEXT"));
        assert!(!SCHEMA.contains("VARCHAR(255)"));
    }
}
