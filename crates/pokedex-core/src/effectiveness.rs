//! Type-effectiveness table for a creature's own types.
//!
//! Defense (`from`) multiplies across own types. Offense (`to`) keeps the
//! best single-type outcome: doubling is `max(current, 2)`, halving is
//! `min(current, 0.5)`, immunity sets 0.

use crate::config::ProviderDefaults;
use crate::models::TypeEffectiveness;
use crate::network::ProviderFetch;
use crate::provider::{decode, NamedResource, RawDamageRelations, RawType};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Both maps at 1.0 for every known type.
pub fn neutral_table() -> TypeEffectiveness {
    let all: BTreeMap<String, f64> = ProviderDefaults::TYPE_NAMES
        .iter()
        .map(|t| (t.to_string(), 1.0))
        .collect();
    TypeEffectiveness {
        from: all.clone(),
        to: all,
    }
}

/// Fold one own type's damage relations into `table`.
pub fn apply_relations(table: &mut TypeEffectiveness, relations: &RawDamageRelations) {
    let scale = |map: &mut BTreeMap<String, f64>, targets: &[NamedResource], factor: f64| {
        for t in targets {
            *map.entry(t.name.clone()).or_insert(1.0) *= factor;
        }
    };
    scale(&mut table.from, &relations.double_damage_from, 2.0);
    scale(&mut table.from, &relations.half_damage_from, 0.5);
    scale(&mut table.from, &relations.no_damage_from, 0.0);

    for t in &relations.double_damage_to {
        let v = table.to.entry(t.name.clone()).or_insert(1.0);
        *v = v.max(2.0);
    }
    for t in &relations.half_damage_to {
        let v = table.to.entry(t.name.clone()).or_insert(1.0);
        *v = v.min(0.5);
    }
    for t in &relations.no_damage_to {
        table.to.insert(t.name.clone(), 0.0);
    }
}

/// Builds [`TypeEffectiveness`] tables from the provider's `type/{name}` records.
pub struct EffectivenessCalculator {
    fetch: Arc<dyn ProviderFetch>,
}

impl EffectivenessCalculator {
    pub fn new(fetch: Arc<dyn ProviderFetch>) -> Self {
        Self { fetch }
    }

    /// Compute the table for `types`. A type whose record cannot be fetched
    /// is skipped and the partial table is returned.
    pub async fn compute(&self, types: &[String], verify_tls: bool) -> TypeEffectiveness {
        let lookups = types.iter().map(|name| self.relations(name, verify_tls));
        // Fetched concurrently, folded in slot order: offense folding is
        // order-sensitive once immunity is involved.
        let results = join_all(lookups).await;

        let mut table = neutral_table();
        for (name, result) in types.iter().zip(results) {
            match result {
                Some(relations) => apply_relations(&mut table, &relations),
                None => debug!("Effectiveness computed without type {}", name),
            }
        }
        table
    }

    async fn relations(&self, name: &str, verify_tls: bool) -> Option<RawDamageRelations> {
        let path = format!("type/{}", name);
        let record = self
            .fetch
            .get_json(&path, &[], verify_tls)
            .await
            .and_then(|value| decode::<RawType>("type", value));
        match record {
            Ok(record) => Some(record.damage_relations),
            Err(e) => {
                warn!("Skipping damage relations for type {}: {}", name, e);
                None
            }
        }
    }
}
