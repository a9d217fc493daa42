//! Raw provider record -> [`PokemonDetail`].
//!
//! Pure functions: no I/O, no caching.

use crate::models::{PokemonDetail, PokemonStats};
use crate::provider::{RawPokemon, RawSprites, RawStat};

/// Normalize one `pokemon/{id}` record.
pub fn normalize_detail(raw: &RawPokemon) -> PokemonDetail {
    PokemonDetail {
        code: raw.id,
        name: raw.name.clone(),
        types: type_names(raw),
        image_url: select_image(&raw.sprites),
        stats: Some(extract_stats(&raw.stats)),
        ..PokemonDetail::default()
    }
}

/// Type names in slot order.
pub fn type_names(raw: &RawPokemon) -> Vec<String> {
    let mut slots: Vec<_> = raw.types.iter().collect();
    slots.sort_by_key(|t| t.slot);
    let mut names: Vec<String> = Vec::with_capacity(slots.len());
    for slot in slots {
        if !slot.kind.name.is_empty() && !names.contains(&slot.kind.name) {
            names.push(slot.kind.name.clone());
        }
    }
    names
}

/// Official artwork, then the generic front sprite, then empty.
pub fn select_image(sprites: &RawSprites) -> String {
    sprites
        .other
        .as_ref()
        .and_then(|o| o.official_artwork.as_ref())
        .and_then(|a| a.front_default.clone())
        .filter(|url| !url.is_empty())
        .or_else(|| sprites.front_default.clone().filter(|url| !url.is_empty()))
        .unwrap_or_default()
}

/// Look up the six base stats by name; missing ones count as 0.
pub fn extract_stats(stats: &[RawStat]) -> PokemonStats {
    let value = |name: &str| {
        stats
            .iter()
            .find(|s| s.stat.name == name)
            .map(|s| s.base_stat)
            .unwrap_or(0)
    };

    PokemonStats::new(
        value("hp"),
        value("attack"),
        value("defense"),
        value("special-attack"),
        value("special-defense"),
        value("speed"),
    )
}

/// Provider heights and weights are in tenths (decimetres, hectograms).
pub fn tenths(value: Option<u32>) -> Option<f64> {
    value.map(|v| f64::from(v) / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::decode;
    use serde_json::json;

    fn pikachu() -> RawPokemon {
        decode(
            "pokemon",
            json!({
                "id": 25,
                "name": "pikachu",
                "height": 4,
                "weight": 60,
                "types": [{"slot": 1, "type": {"name": "electric", "url": ""}}],
                "sprites": {
                    "front_default": "https://img.test/front/25.png",
                    "other": {"official-artwork": {"front_default": "https://img.test/art/25.png"}}
                },
                "stats": [
                    {"base_stat": 90, "stat": {"name": "speed"}},
                    {"base_stat": 35, "stat": {"name": "hp"}},
                    {"base_stat": 55, "stat": {"name": "attack"}},
                    {"base_stat": 40, "stat": {"name": "defense"}},
                    {"base_stat": 50, "stat": {"name": "special-attack"}},
                    {"base_stat": 50, "stat": {"name": "special-defense"}}
                ]
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_full_record() {
        let detail = normalize_detail(&pikachu());
        assert_eq!(detail.code, 25);
        assert_eq!(detail.name, "pikachu");
        assert_eq!(detail.types, vec!["electric"]);
        assert_eq!(detail.image_url, "https://img.test/art/25.png");

        let stats = detail.stats.unwrap();
        assert_eq!(stats.hp, 35);
        assert_eq!(stats.speed, 90);
        assert_eq!(stats.total, 320);
    }

    #[test]
    fn test_image_fallbacks() {
        let mut raw = pikachu();
        raw.sprites.other = None;
        assert_eq!(normalize_detail(&raw).image_url, "https://img.test/front/25.png");

        raw.sprites.front_default = None;
        assert_eq!(normalize_detail(&raw).image_url, "");
    }

    #[test]
    fn test_missing_stats_default_to_zero() {
        let mut raw = pikachu();
        raw.stats.retain(|s| s.stat.name != "speed");
        let stats = normalize_detail(&raw).stats.unwrap();
        assert_eq!(stats.speed, 0);
        assert_eq!(stats.total, 230);
    }

    #[test]
    fn test_types_follow_slot_order() {
        let raw: RawPokemon = decode(
            "pokemon",
            json!({
                "id": 6,
                "types": [
                    {"slot": 2, "type": {"name": "flying"}},
                    {"slot": 1, "type": {"name": "fire"}}
                ]
            }),
        )
        .unwrap();
        assert_eq!(type_names(&raw), vec!["fire", "flying"]);
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(tenths(Some(4)), Some(0.4));
        assert_eq!(tenths(Some(905)), Some(90.5));
        assert_eq!(tenths(None), None);
    }
}
