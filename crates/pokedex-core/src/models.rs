//! Transient response types handed to the boundary layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::Settings;
use crate::error::{PokedexError, Result};

/// Six base stats plus their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonStats {
    pub hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub sp_attack: u32,
    pub sp_defense: u32,
    pub speed: u32,
    pub total: u32,
}

impl PokemonStats {
    /// Build from the six base values; `total` is derived.
    pub fn new(
        hp: u32,
        attack: u32,
        defense: u32,
        sp_attack: u32,
        sp_defense: u32,
        speed: u32,
    ) -> Self {
        Self {
            hp,
            attack,
            defense,
            sp_attack,
            sp_defense,
            speed,
            total: hp + attack + defense + sp_attack + sp_defense + speed,
        }
    }
}

/// One ability on the composite view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ability {
    pub name: String,
    /// Localized short effect; empty when the lookup failed.
    pub effect: String,
    pub is_hidden: bool,
}

/// Male/female probabilities derived from the provider's eighths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenderRatio {
    pub male_rate: f64,
    pub female_rate: f64,
    pub genderless: bool,
}

impl GenderRatio {
    /// Provider sentinel for species without gender.
    pub const GENDERLESS_RATE: i32 = -1;

    /// Convert a provider `gender_rate` (eighths female, -1 = genderless).
    pub fn from_rate(rate: i32) -> Self {
        if rate == Self::GENDERLESS_RATE {
            return Self {
                male_rate: 0.0,
                female_rate: 0.0,
                genderless: true,
            };
        }
        let female_rate = f64::from(rate.clamp(0, 8)) / 8.0;
        Self {
            male_rate: 1.0 - female_rate,
            female_rate,
            genderless: false,
        }
    }
}

/// Damage multipliers by type name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeEffectiveness {
    /// Damage this creature takes from each attacking type.
    pub from: BTreeMap<String, f64>,
    /// Best damage this creature's own types deal to each defending type.
    pub to: BTreeMap<String, f64>,
}

/// Transition conditions for one evolution step.
///
/// The named fields cover the common provider vocabulary; anything else the
/// provider sends lands in `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held_item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_happiness: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_affection: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_beauty: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_move: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_move_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_species: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_rain: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One species in an evolution chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionNode {
    pub code: u32,
    pub name: String,
    pub image_url: String,
    #[serde(flatten)]
    pub conditions: EvolutionConditions,
}

/// Summary of an edge's target, enough to render it without a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionTarget {
    pub code: u32,
    pub name: String,
    pub image_url: String,
    pub types: Vec<String>,
}

/// Directed `from -> to` evolution step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionEdge {
    pub from: u32,
    pub to: u32,
    #[serde(flatten)]
    pub conditions: EvolutionConditions,
    pub to_data: EvolutionTarget,
}

/// Normalized creature record; composite fields are filled only by the
/// aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonDetail {
    pub code: u32,
    pub name: String,
    pub types: Vec<String>,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<PokemonStats>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "height_m", skip_serializing_if = "Option::is_none")]
    pub height_m: Option<f64>,
    #[serde(rename = "weight_kg", skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abilities: Option<Vec<Ability>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<GenderRatio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effectiveness: Option<TypeEffectiveness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evolutions: Option<Vec<EvolutionNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evolution_edges: Option<Vec<EvolutionEdge>>,
}

impl PokemonDetail {
    /// Name-only placeholder used when a page item cannot be fetched.
    pub fn stub(code: u32, name: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            image_url: image_url.into(),
            ..Self::default()
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PokemonPage {
    /// Size of the filtered population before slicing.
    #[serde(rename = "count")]
    pub total: u32,
    pub results: Vec<PokemonDetail>,
    /// Items that fell back to a stub.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub degraded: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Already-parsed search request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub generation: Option<u32>,
    pub name: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
    pub verify: Option<bool>,
}

impl SearchParams {
    /// Normalize the request: blank names become `None`, the limit is
    /// clamped to `1..=max`, generation 0 is rejected.
    pub fn validated(mut self, settings: &Settings) -> Result<Self> {
        if self.generation == Some(0) {
            return Err(PokedexError::Validation {
                field: "generation".into(),
                message: "must be a positive integer".into(),
            });
        }

        self.name = self
            .name
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty());

        let limit = self.limit.unwrap_or_else(|| settings.default_limit());
        self.limit = Some(limit.clamp(1, settings.max_limit()));
        Ok(self)
    }

    /// Page size after validation.
    pub fn page_size(&self) -> u32 {
        self.limit.unwrap_or(crate::config::PaginationConfig::DEFAULT_LIMIT)
    }
}

/// Result of a type catalog sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSyncSummary {
    pub created: u32,
    pub existing: u32,
    pub count: u32,
}
