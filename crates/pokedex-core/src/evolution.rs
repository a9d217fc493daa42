//! Evolution chain traversal.
//!
//! The provider describes a chain as a tree of species links. [`walk`]
//! visits it depth-first in pre-order and emits one [`EvolutionNode`] per
//! resolved species and one [`EvolutionEdge`] per parent -> child transition.
//! A node whose lookup fails is left out; its siblings and descendants are
//! still visited.

use crate::error::{PokedexError, Result};
use crate::models::{EvolutionConditions, EvolutionEdge, EvolutionNode, EvolutionTarget};
use crate::provider::RawChainLink;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

/// Resolves a species code to the summary shown on graph nodes.
#[async_trait]
pub trait SpeciesLookup: Send + Sync {
    async fn summary(&self, code: u32, verify_tls: bool) -> Result<EvolutionTarget>;
}

/// Nodes and edges of one chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvolutionGraph {
    pub nodes: Vec<EvolutionNode>,
    pub edges: Vec<EvolutionEdge>,
}

/// Walk `root` depth-first, resolving every node through `lookup`.
pub async fn walk(
    root: &RawChainLink,
    lookup: &dyn SpeciesLookup,
    verify_tls: bool,
) -> EvolutionGraph {
    let mut graph = EvolutionGraph::default();
    // (link, code of the emitted parent node)
    let mut stack: Vec<(&RawChainLink, Option<u32>)> = vec![(root, None)];

    while let Some((link, parent)) = stack.pop() {
        let resolved = match resolve(link, lookup, verify_tls).await {
            Ok(target) => Some(target),
            Err(e) => {
                warn!("Skipping evolution node {}: {}", link.species.name, e);
                None
            }
        };

        if let Some(target) = &resolved {
            let conditions = conditions_from(link.evolution_details.first());
            graph.nodes.push(EvolutionNode {
                code: target.code,
                name: target.name.clone(),
                image_url: target.image_url.clone(),
                conditions: conditions.clone(),
            });
            if let Some(from) = parent {
                graph.edges.push(EvolutionEdge {
                    from,
                    to: target.code,
                    conditions,
                    to_data: target.clone(),
                });
            }
        }

        let code = resolved.map(|t| t.code);
        // Reverse push keeps children in provider order.
        for child in link.evolves_to.iter().rev() {
            stack.push((child, code));
        }
    }

    graph
}

async fn resolve(
    link: &RawChainLink,
    lookup: &dyn SpeciesLookup,
    verify_tls: bool,
) -> Result<EvolutionTarget> {
    let code = link.species.id().ok_or_else(|| PokedexError::NotFound {
        resource: format!("species id in {}", link.species.url),
    })?;
    lookup.summary(code, verify_tls).await
}

/// Map one provider `evolution_details` entry onto the condition bag.
///
/// Named resources collapse to their name; nulls, `false` flags and empty
/// strings are dropped. Keys outside the named fields land in `extra` in
/// camelCase.
pub fn conditions_from(details: Option<&Map<String, Value>>) -> EvolutionConditions {
    let mut conditions = EvolutionConditions::default();
    let Some(details) = details else {
        return conditions;
    };

    for (key, value) in details {
        let Some(value) = meaningful(value) else {
            continue;
        };
        match key.as_str() {
            "trigger" => conditions.trigger = as_name(&value),
            "item" => conditions.item = as_name(&value),
            "held_item" => conditions.held_item = as_name(&value),
            "min_level" => conditions.min_level = as_u32(&value),
            "min_happiness" => conditions.min_happiness = as_u32(&value),
            "min_affection" => conditions.min_affection = as_u32(&value),
            "min_beauty" => conditions.min_beauty = as_u32(&value),
            "time_of_day" => conditions.time_of_day = as_name(&value),
            "known_move" => conditions.known_move = as_name(&value),
            "known_move_type" => conditions.known_move_type = as_name(&value),
            "location" => conditions.location = as_name(&value),
            "trade_species" => conditions.trade_species = as_name(&value),
            "gender" => conditions.gender = value.as_i64(),
            "needs_overworld_rain" => conditions.needs_rain = value.as_bool(),
            other => {
                conditions.extra.insert(camel_case(other), value);
            }
        }
    }

    conditions
}

/// Collapse `{name, url}` objects to the name and drop empty values.
fn meaningful(value: &Value) -> Option<Value> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Object(obj) => obj.get("name").and_then(meaningful),
        other => Some(other.clone()),
    }
}

fn as_name(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{decode, RawEvolutionChain};
    use serde_json::json;
    use std::collections::HashSet;

    struct FixedLookup {
        failing: HashSet<u32>,
    }

    #[async_trait]
    impl SpeciesLookup for FixedLookup {
        async fn summary(&self, code: u32, _verify_tls: bool) -> Result<EvolutionTarget> {
            if self.failing.contains(&code) {
                return Err(PokedexError::Other("lookup failed".into()));
            }
            Ok(EvolutionTarget {
                code,
                name: format!("species-{}", code),
                image_url: format!("https://img.test/{}.png", code),
                types: vec!["normal".into()],
            })
        }
    }

    fn lookup(failing: &[u32]) -> FixedLookup {
        FixedLookup {
            failing: failing.iter().copied().collect(),
        }
    }

    fn link(id: u32, details: Value, children: Vec<Value>) -> Value {
        json!({
            "species": {"name": format!("s{}", id), "url": format!("https://pokeapi.test/api/v2/pokemon-species/{}/", id)},
            "evolution_details": details,
            "evolves_to": children
        })
    }

    fn chain(root: Value) -> RawChainLink {
        decode::<RawEvolutionChain>("evolution-chain", json!({"chain": root}))
            .unwrap()
            .chain
    }

    fn level_up(level: u32) -> Value {
        json!([{
            "trigger": {"name": "level-up", "url": ""},
            "min_level": level,
            "item": null,
            "time_of_day": "",
            "needs_overworld_rain": false,
            "turn_upside_down": false
        }])
    }

    #[tokio::test]
    async fn test_linear_chain() {
        let root = chain(link(
            4,
            json!([]),
            vec![link(5, level_up(16), vec![link(6, level_up(36), vec![])])],
        ));

        let graph = walk(&root, &lookup(&[]), true).await;
        let codes: Vec<u32> = graph.nodes.iter().map(|n| n.code).collect();
        assert_eq!(codes, vec![4, 5, 6]);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!((graph.edges[0].from, graph.edges[0].to), (4, 5));
        assert_eq!((graph.edges[1].from, graph.edges[1].to), (5, 6));
        assert_eq!(graph.edges[1].conditions.min_level, Some(36));
        assert_eq!(graph.edges[1].to_data.name, "species-6");
        assert_eq!(graph.nodes[0].conditions, EvolutionConditions::default());
    }

    #[tokio::test]
    async fn test_branching_chain_keeps_provider_order() {
        let stone = |item: &str| {
            json!([{"trigger": {"name": "use-item"}, "item": {"name": item}}])
        };
        let root = chain(link(
            133,
            json!([]),
            vec![
                link(134, stone("water-stone"), vec![]),
                link(135, stone("thunder-stone"), vec![]),
                link(136, stone("fire-stone"), vec![]),
            ],
        ));

        let graph = walk(&root, &lookup(&[]), true).await;
        let codes: Vec<u32> = graph.nodes.iter().map(|n| n.code).collect();
        assert_eq!(codes, vec![133, 134, 135, 136]);
        assert!(graph.edges.iter().all(|e| e.from == 133));
        assert_eq!(graph.edges[1].conditions.item.as_deref(), Some("thunder-stone"));
    }

    #[tokio::test]
    async fn test_failed_node_is_skipped() {
        let root = chain(link(
            133,
            json!([]),
            vec![
                link(134, json!([]), vec![]),
                link(135, json!([]), vec![]),
            ],
        ));

        let graph = walk(&root, &lookup(&[134]), true).await;
        let codes: Vec<u32> = graph.nodes.iter().map(|n| n.code).collect();
        assert_eq!(codes, vec![133, 135]);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].to, 135);
    }

    #[test]
    fn test_condition_mapping() {
        let details = json!({
            "trigger": {"name": "trade"},
            "held_item": {"name": "metal-coat"},
            "min_happiness": 220,
            "time_of_day": "day",
            "gender": 1,
            "needs_overworld_rain": true,
            "relative_physical_stats": 0,
            "party_species": null,
            "turn_upside_down": false
        });
        let conditions = conditions_from(details.as_object());
        assert_eq!(conditions.trigger.as_deref(), Some("trade"));
        assert_eq!(conditions.held_item.as_deref(), Some("metal-coat"));
        assert_eq!(conditions.min_happiness, Some(220));
        assert_eq!(conditions.time_of_day.as_deref(), Some("day"));
        assert_eq!(conditions.gender, Some(1));
        assert_eq!(conditions.needs_rain, Some(true));
        assert_eq!(conditions.extra.get("relativePhysicalStats"), Some(&json!(0)));
        assert!(!conditions.extra.contains_key("partySpecies"));
        assert!(!conditions.extra.contains_key("turnUpsideDown"));
    }
}
