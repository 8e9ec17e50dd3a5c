use driftgate_schema::{ContextMap, ProviderKey};
use rand::Rng;

use crate::error::GatewayError;

/// A key chosen for a single dispatch, or the caller's own direct key.
#[derive(Debug, Clone)]
pub enum SelectedKey {
    Pool(ProviderKey),
    Direct(String),
}

impl SelectedKey {
    pub fn value(&self) -> &str {
        match self {
            SelectedKey::Pool(key) => &key.value,
            SelectedKey::Direct(value) => value,
        }
    }
}

/// Weighted-random key selection with model-allowlist and governance
/// filtering (spec §4.2).
pub struct KeySelector;

impl KeySelector {
    /// Select a key for `model` out of `keys`, honoring the context's
    /// governance filter (`include_only_key_ids`) and any per-request direct
    /// key (BYOK), which bypasses selection entirely.
    pub fn select(
        keys: &[ProviderKey],
        model: &str,
        context: &ContextMap,
    ) -> Result<SelectedKey, GatewayError> {
        if let Some(direct) = &context.direct_key {
            return Ok(SelectedKey::Direct(direct.clone()));
        }

        let candidates: Vec<&ProviderKey> = keys
            .iter()
            .filter(|k| k.is_selectable())
            .filter(|k| k.allows_model(model))
            .filter(|k| context.governs_key(k.id))
            .collect();

        if candidates.is_empty() {
            return Err(GatewayError::NoValidKey);
        }

        let total_weight: f64 = candidates.iter().map(|k| k.weight).sum();
        if total_weight <= 0.0 {
            return Err(GatewayError::NoValidKey);
        }

        let r: f64 = rand::thread_rng().gen_range(0.0..total_weight);
        let mut cumulative = 0.0;
        for key in &candidates {
            cumulative += key.weight;
            if cumulative > r {
                return Ok(SelectedKey::Pool((*key).clone()));
            }
        }
        // Floating-point edge case: cumulative weight landed exactly on the
        // upper bound. Fall back to the last candidate rather than erroring.
        Ok(SelectedKey::Pool((*candidates.last().unwrap()).clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use uuid::Uuid;

    fn key(weight: f64, models: &[&str]) -> ProviderKey {
        ProviderKey {
            id: Uuid::new_v4(),
            value: format!("sk-{}", Uuid::new_v4()),
            models: models.iter().map(|s| s.to_string()).collect(),
            weight,
            provider_specific: None,
        }
    }

    #[test]
    fn no_keys_is_no_valid_key() {
        let ctx = ContextMap::new(Uuid::new_v4());
        let err = KeySelector::select(&[], "gpt-4o", &ctx).unwrap_err();
        assert!(matches!(err, GatewayError::NoValidKey));
    }

    #[test]
    fn weight_zero_key_excluded() {
        let keys = vec![key(0.0, &[])];
        let ctx = ContextMap::new(Uuid::new_v4());
        let err = KeySelector::select(&keys, "gpt-4o", &ctx).unwrap_err();
        assert!(matches!(err, GatewayError::NoValidKey));
    }

    #[test]
    fn model_allowlist_filters_keys() {
        let allowed = key(1.0, &["gpt-4o"]);
        let other = key(1.0, &["claude-3"]);
        let keys = vec![allowed.clone(), other];
        let ctx = ContextMap::new(Uuid::new_v4());
        let selected = KeySelector::select(&keys, "gpt-4o", &ctx).unwrap();
        match selected {
            SelectedKey::Pool(k) => assert_eq!(k.id, allowed.id),
            SelectedKey::Direct(_) => panic!("expected pool key"),
        }
    }

    #[test]
    fn direct_key_bypasses_selection() {
        let keys = vec![key(1.0, &[])];
        let mut ctx = ContextMap::new(Uuid::new_v4());
        ctx.direct_key = Some("sk-direct".to_string());
        let selected = KeySelector::select(&keys, "gpt-4o", &ctx).unwrap();
        match selected {
            SelectedKey::Direct(v) => assert_eq!(v, "sk-direct"),
            SelectedKey::Pool(_) => panic!("expected direct key"),
        }
    }

    #[test]
    fn governance_filter_intersects_allowlist() {
        let a = key(1.0, &[]);
        let b = key(1.0, &[]);
        let keys = vec![a.clone(), b.clone()];
        let mut ctx = ContextMap::new(Uuid::new_v4());
        ctx.include_only_key_ids = [b.id].into_iter().collect();
        let selected = KeySelector::select(&keys, "gpt-4o", &ctx).unwrap();
        match selected {
            SelectedKey::Pool(k) => assert_eq!(k.id, b.id),
            SelectedKey::Direct(_) => panic!("expected pool key"),
        }
    }

    #[test]
    fn weighted_selection_respects_proportion() {
        let heavy = key(9.0, &[]);
        let light = key(1.0, &[]);
        let keys = vec![heavy.clone(), light.clone()];
        let ctx = ContextMap::new(Uuid::new_v4());

        let mut heavy_count = 0u32;
        let n = 10_000;
        for _ in 0..n {
            match KeySelector::select(&keys, "gpt-4o", &ctx).unwrap() {
                SelectedKey::Pool(k) if k.id == heavy.id => heavy_count += 1,
                SelectedKey::Pool(_) => {}
                SelectedKey::Direct(_) => panic!("unexpected direct key"),
            }
        }
        let observed = heavy_count as f64 / n as f64;
        assert!((observed - 0.9).abs() < 0.05, "observed {observed}");
    }

    #[test]
    fn duplicate_model_maps_to_hashmap_roundtrip() {
        // Sanity check that models using HashMap-based provider_specific still
        // round-trip through serde without affecting selection.
        let mut deployments = HashMap::new();
        deployments.insert("gpt-4o".to_string(), "prod-gpt4o".to_string());
        let mut k = key(1.0, &["gpt-4o"]);
        k.provider_specific = Some(driftgate_schema::ProviderSpecific::Azure {
            endpoint: "https://example.openai.azure.com".into(),
            deployments,
            api_version: "2024-05-01".into(),
        });
        let json = serde_json::to_string(&k).unwrap();
        let back: ProviderKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, k.id);
        let _: BTreeSet<String> = back.models;
    }
}
