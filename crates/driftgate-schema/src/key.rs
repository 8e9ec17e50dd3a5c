use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single credential within a provider's key pool.
///
/// Invariant (spec §3): `value` and `provider_specific` (when present) must be
/// non-empty after environment-variable resolution, and a key with
/// `weight == 0.0` is never selected by the key selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderKey {
    pub id: Uuid,
    pub value: String,
    /// Empty ⇒ the key is valid for any model.
    #[serde(default)]
    pub models: BTreeSet<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_specific: Option<ProviderSpecific>,
}

fn default_weight() -> f64 {
    1.0
}

impl ProviderKey {
    pub fn allows_model(&self, model: &str) -> bool {
        self.models.is_empty() || self.models.contains(model)
    }

    pub fn is_selectable(&self) -> bool {
        self.weight > 0.0 && !self.value.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderSpecific {
    Azure {
        endpoint: String,
        #[serde(default)]
        deployments: HashMap<String, String>,
        api_version: String,
    },
    Vertex {
        project: String,
        region: String,
        credentials: String,
    },
    Bedrock {
        access: String,
        secret: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arn: Option<String>,
        #[serde(default)]
        deployments: HashMap<String, String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_zero_key_is_not_selectable() {
        let key = ProviderKey {
            id: Uuid::nil(),
            value: "sk-test".into(),
            models: BTreeSet::new(),
            weight: 0.0,
            provider_specific: None,
        };
        assert!(!key.is_selectable());
    }

    #[test]
    fn empty_model_set_allows_any_model() {
        let key = ProviderKey {
            id: Uuid::nil(),
            value: "sk-test".into(),
            models: BTreeSet::new(),
            weight: 1.0,
            provider_specific: None,
        };
        assert!(key.allows_model("gpt-4o"));
        assert!(key.allows_model("anything"));
    }
}
