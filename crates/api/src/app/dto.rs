//! Request/response DTOs and mapping to/from domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use invcfg_rules::{InventoryRule, RuleInput};

/// Body of create/update requests.
///
/// Every field is optional on the wire so that a missing `name` is reported
/// as a validation failure rather than a deserialization error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl From<RuleRequest> for RuleInput {
    fn from(value: RuleRequest) -> Self {
        RuleInput {
            name: value.name,
            description: value.description,
            is_active: value.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InventoryRule> for RuleResponse {
    fn from(rule: InventoryRule) -> Self {
        Self {
            id: rule.id.value(),
            name: rule.name,
            description: rule.description,
            is_active: rule.is_active,
            updated_by: rule.updated_by,
            created_at: rule.created_at,
            updated_at: rule.updated_at,
        }
    }
}

pub fn rule_list(rules: Vec<InventoryRule>) -> Vec<RuleResponse> {
    rules.into_iter().map(RuleResponse::from).collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn ok(now: DateTime<Utc>) -> Self {
        Self {
            status: "OK",
            service: "inventory-config-service",
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invcfg_core::RuleId;
    use serde_json::json;

    #[test]
    fn request_accepts_camel_case_and_missing_fields() {
        let full: RuleRequest =
            serde_json::from_value(json!({"name": "Reorder", "description": "x", "isActive": false}))
                .unwrap();
        assert_eq!(full.is_active, Some(false));

        let bare: RuleRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(bare, RuleRequest::default());

        let input: RuleInput = full.into();
        assert_eq!(input.name.as_deref(), Some("Reorder"));
        assert_eq!(input.description.as_deref(), Some("x"));
        assert_eq!(input.is_active, Some(false));
    }

    #[test]
    fn response_uses_camel_case_and_rfc3339() {
        let now = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let rule = InventoryRule {
            id: RuleId::new(7),
            name: "Reorder".to_string(),
            description: None,
            is_active: true,
            updated_by: "admin-1".to_string(),
            created_at: now,
            updated_at: now,
        };

        let value = serde_json::to_value(RuleResponse::from(rule)).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["isActive"], true);
        assert_eq!(value["updatedBy"], "admin-1");
        assert_eq!(value["createdAt"], "2024-05-01T10:00:00Z");
        assert!(value["description"].is_null());
    }

    #[test]
    fn list_mapping_preserves_order() {
        let now = Utc::now();
        let rules: Vec<InventoryRule> = (1..=3)
            .map(|i| InventoryRule {
                id: RuleId::new(i),
                name: format!("rule-{i}"),
                description: None,
                is_active: true,
                updated_by: "a".to_string(),
                created_at: now,
                updated_at: now,
            })
            .collect();

        let ids: Vec<i64> = rule_list(rules).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
