//! Feature flags, their per-environment rule lists, and environments.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub toggle_on_list: bool,
    #[serde(default)]
    pub default_state: bool,
}

impl Environment {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            toggle_on_list: false,
            default_state: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRule {
    pub enabled: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Type-specific part of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuleKind {
    Force {
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    Rollout {
        value: String,
        coverage: f64,
        hash_attribute: String,
    },
    #[serde(rename_all = "camelCase")]
    ExperimentRef {
        experiment_id: String,
    },
}

impl RuleKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            RuleKind::Force { .. } => "force",
            RuleKind::Rollout { .. } => "rollout",
            RuleKind::ExperimentRef { .. } => "experiment-ref",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRule {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub schedule_rules: Vec<ScheduleRule>,
    #[serde(flatten)]
    pub kind: RuleKind,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureEnvironment {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<FeatureRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    pub organization: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub environment_settings: IndexMap<String, FeatureEnvironment>,
}

impl Feature {
    /// Rules for one environment; unknown environments have none.
    pub fn rules(&self, environment: &str) -> &[FeatureRule] {
        self.environment_settings
            .get(environment)
            .map(|e| e.rules.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_kinds_deserialize_from_type_tag() {
        let feature: Feature = serde_json::from_value(serde_json::json!({
            "id": "checkout-v2",
            "organization": "org_1",
            "environmentSettings": {
                "production": {
                    "enabled": true,
                    "rules": [
                        {"id": "r1", "type": "force", "value": "true"},
                        {"id": "r2", "type": "rollout", "value": "true", "coverage": 0.5, "hashAttribute": "id"},
                        {"id": "r3", "type": "experiment-ref", "experimentId": "exp_1", "enabled": false}
                    ]
                }
            }
        }))
        .unwrap();

        let rules = feature.rules("production");
        assert_eq!(rules.len(), 3);
        assert!(rules[0].enabled);
        assert_eq!(rules[1].kind.type_name(), "rollout");
        assert_eq!(
            rules[2].kind,
            RuleKind::ExperimentRef {
                experiment_id: "exp_1".into()
            }
        );
        assert!(!rules[2].enabled);
        assert!(feature.rules("staging").is_empty());
    }
}
