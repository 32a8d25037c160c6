use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use invcfg_core::{DomainError, DomainResult, Entity, FieldViolation, RuleId};

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Case-folded form of a rule name, used for every uniqueness comparison.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Unvalidated create/update input, as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl RuleInput {
    /// Check every field and report all violations at once.
    pub fn validate(self) -> DomainResult<ValidRuleInput> {
        let mut violations = Vec::new();

        match self.name.as_deref() {
            None => violations.push(FieldViolation::new("name", "Name is required")),
            Some(name) if name.trim().is_empty() => {
                violations.push(FieldViolation::new("name", "Name is required"));
                // A blank name of the wrong length violates both constraints.
                if !name_length_ok(name) {
                    violations.push(name_length_violation());
                }
            }
            Some(name) if !name_length_ok(name) => violations.push(name_length_violation()),
            Some(_) => {}
        }

        if let Some(description) = self.description.as_deref() {
            if description.chars().count() > DESCRIPTION_MAX_CHARS {
                violations.push(FieldViolation::new(
                    "description",
                    "Description cannot exceed 500 characters",
                ));
            }
        }

        if !violations.is_empty() {
            return Err(DomainError::validation(violations));
        }

        Ok(ValidRuleInput {
            name: self.name.unwrap_or_default(),
            description: self.description,
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

fn name_length_ok(name: &str) -> bool {
    let len = name.chars().count();
    (NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len)
}

fn name_length_violation() -> FieldViolation {
    FieldViolation::new("name", "Name must be between 2 and 100 characters")
}

/// Input that passed validation. Only obtainable through [`RuleInput::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRuleInput {
    name: String,
    description: Option<String>,
    is_active: bool,
}

impl ValidRuleInput {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }
}

/// A rule that has not been persisted yet (no id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRule {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewRule {
    pub fn new(input: ValidRuleInput, actor_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: input.name,
            description: input.description,
            is_active: input.is_active,
            updated_by: actor_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach the identifier assigned by the store.
    pub fn with_id(self, id: RuleId) -> InventoryRule {
        InventoryRule {
            id,
            name: self.name,
            description: self.description,
            is_active: self.is_active,
            updated_by: self.updated_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A persisted inventory rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRule {
    pub id: RuleId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for InventoryRule {
    type Id = RuleId;

    fn id(&self) -> RuleId {
        self.id
    }
}

impl InventoryRule {
    /// Whether `name` collides with this rule's name (case-insensitive).
    pub fn has_name(&self, name: &str) -> bool {
        name_key(&self.name) == name_key(name)
    }

    /// Replace the editable fields, attributing the write to `actor_id`.
    pub fn overwritten(
        self,
        input: ValidRuleInput,
        actor_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let updated_at = self.stamp(now);
        Self {
            name: input.name,
            description: input.description,
            is_active: input.is_active,
            updated_by: actor_id.into(),
            updated_at,
            ..self
        }
    }

    /// Flip `is_active`, attributing the write to `actor_id`.
    pub fn toggled(self, actor_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        let updated_at = self.stamp(now);
        Self {
            is_active: !self.is_active,
            updated_by: actor_id.into(),
            updated_at,
            ..self
        }
    }

    // updated_at never moves behind created_at, even with a skewed clock.
    fn stamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.created_at)
    }
}
