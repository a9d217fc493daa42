//! Deserialization types for provider (PokeAPI) records.
//!
//! Only the fields the core reads are modelled; everything is defaulted so a
//! partially populated record still decodes.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{PokedexError, Result};

/// Decode a raw JSON record into one of the provider types.
pub fn decode<T: DeserializeOwned>(what: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| PokedexError::Json {
        message: format!("Unexpected {} record shape: {}", what, e),
        source: Some(e),
    })
}

/// `{name, url}` reference to another provider record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedResource {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl NamedResource {
    /// Trailing numeric id of the referenced record (`.../pokemon-species/25/`).
    pub fn id(&self) -> Option<u32> {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|segment| segment.parse().ok())
    }
}

/// Paginated listing (`pokemon?limit=&offset=`, `type`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListPage {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub results: Vec<NamedResource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPokemon {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub types: Vec<RawTypeSlot>,
    #[serde(default)]
    pub sprites: RawSprites,
    #[serde(default)]
    pub stats: Vec<RawStat>,
    #[serde(default)]
    pub abilities: Vec<RawAbilitySlot>,
    #[serde(default)]
    pub species: Option<NamedResource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTypeSlot {
    #[serde(default)]
    pub slot: u8,
    #[serde(rename = "type")]
    pub kind: NamedResource,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSprites {
    #[serde(default)]
    pub front_default: Option<String>,
    #[serde(default)]
    pub other: Option<RawOtherSprites>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOtherSprites {
    #[serde(rename = "official-artwork", default)]
    pub official_artwork: Option<RawArtwork>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArtwork {
    #[serde(default)]
    pub front_default: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStat {
    #[serde(default)]
    pub base_stat: u32,
    pub stat: NamedResource,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAbilitySlot {
    pub ability: NamedResource,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub slot: u8,
}

/// `pokemon-species/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSpecies {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub names: Vec<RawName>,
    #[serde(default)]
    pub flavor_text_entries: Vec<RawFlavorText>,
    #[serde(default)]
    pub genera: Vec<RawGenus>,
    #[serde(default = "genderless_sentinel")]
    pub gender_rate: i32,
    #[serde(default)]
    pub evolution_chain: Option<UrlRef>,
}

fn genderless_sentinel() -> i32 {
    -1
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UrlRef {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawName {
    #[serde(default)]
    pub name: String,
    pub language: NamedResource,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFlavorText {
    #[serde(default)]
    pub flavor_text: String,
    pub language: NamedResource,
    #[serde(default)]
    pub version: Option<NamedResource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGenus {
    #[serde(default)]
    pub genus: String,
    pub language: NamedResource,
}

/// `ability/{name}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAbility {
    #[serde(default)]
    pub names: Vec<RawName>,
    #[serde(default)]
    pub effect_entries: Vec<RawEffect>,
    #[serde(default)]
    pub flavor_text_entries: Vec<RawAbilityFlavor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEffect {
    #[serde(default)]
    pub effect: String,
    #[serde(default)]
    pub short_effect: String,
    pub language: NamedResource,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAbilityFlavor {
    #[serde(default)]
    pub flavor_text: String,
    pub language: NamedResource,
}

/// `type/{name}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawType {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub damage_relations: RawDamageRelations,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDamageRelations {
    #[serde(default)]
    pub double_damage_from: Vec<NamedResource>,
    #[serde(default)]
    pub half_damage_from: Vec<NamedResource>,
    #[serde(default)]
    pub no_damage_from: Vec<NamedResource>,
    #[serde(default)]
    pub double_damage_to: Vec<NamedResource>,
    #[serde(default)]
    pub half_damage_to: Vec<NamedResource>,
    #[serde(default)]
    pub no_damage_to: Vec<NamedResource>,
}

/// `generation/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGeneration {
    #[serde(default)]
    pub pokemon_species: Vec<NamedResource>,
}

/// `evolution-chain/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvolutionChain {
    pub chain: RawChainLink,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawChainLink {
    pub species: NamedResource,
    /// Transition conditions into this link; kept untyped because the
    /// provider vocabulary keeps growing.
    #[serde(default)]
    pub evolution_details: Vec<Map<String, Value>>,
    #[serde(default)]
    pub evolves_to: Vec<RawChainLink>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_named_resource_id() {
        let r = NamedResource {
            name: "pikachu".into(),
            url: "https://pokeapi.co/api/v2/pokemon-species/25/".into(),
        };
        assert_eq!(r.id(), Some(25));
        assert_eq!(NamedResource::default().id(), None);
    }

    #[test]
    fn test_species_defaults_to_genderless() {
        let species: RawSpecies = decode("species", json!({"id": 132})).unwrap();
        assert_eq!(species.gender_rate, -1);
        assert!(species.evolution_chain.is_none());
    }

    #[test]
    fn test_decode_reports_shape_errors() {
        let err = decode::<RawPokemon>("pokemon", json!({"name": "no-id"})).unwrap_err();
        assert!(err.to_string().contains("pokemon"));
    }
}
