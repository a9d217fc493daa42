//! Language selection and translation of provider text.
//!
//! Provider records carry the same text in many languages. [`pick`] chooses
//! the best entry by a fixed preference order; [`Localizer`] then runs
//! non-Portuguese picks through the translation chain.

mod translate;

pub use translate::{
    GoogleTranslate, MyMemoryTranslate, Translation, TranslationChain, TranslationMemo,
    TranslationSource, Translator,
};

use crate::config::TranslationConfig;
use crate::provider::{RawAbilityFlavor, RawEffect, RawFlavorText, RawGenus, RawName};

/// A provider entry tagged with a language.
pub trait LocalizedEntry {
    fn language(&self) -> &str;
}

macro_rules! localized_entry {
    ($($ty:ty),* $(,)?) => {
        $(impl LocalizedEntry for $ty {
            fn language(&self) -> &str {
                &self.language.name
            }
        })*
    };
}

localized_entry!(RawName, RawFlavorText, RawGenus, RawEffect, RawAbilityFlavor);

/// First entry matching the preferred languages in order, else the first
/// entry, else `None`.
pub fn pick<T: LocalizedEntry>(entries: &[T]) -> Option<&T> {
    TranslationConfig::PREFERRED_LANGUAGES
        .iter()
        .find_map(|lang| entries.iter().find(|e| e.language() == *lang))
        .or_else(|| entries.first())
}

/// Picked text with the language it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedText {
    pub text: String,
    /// `None` when the caller's default was used.
    pub language: Option<String>,
}

/// Pick free text, replacing embedded line breaks and form feeds.
pub fn pick_text<T: LocalizedEntry>(
    entries: &[T],
    text: impl Fn(&T) -> &str,
    default: &str,
) -> LocalizedText {
    match pick(entries) {
        Some(entry) => LocalizedText {
            text: clean_text(text(entry)),
            language: Some(entry.language().to_string()),
        },
        None => LocalizedText {
            text: default.to_string(),
            language: None,
        },
    }
}

/// Pick a structured name; the text is kept as-is.
pub fn pick_name<T: LocalizedEntry>(
    entries: &[T],
    name: impl Fn(&T) -> &str,
    default: &str,
) -> String {
    pick(entries)
        .map(|e| name(e).to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Flavor texts are hard-wrapped with `\n` and paged with `\x0c`. Each of
/// those becomes one space; other spacing is left alone.
pub fn clean_text(raw: &str) -> String {
    raw.replace(['\n', '\r', '\x0c'], " ").trim().to_string()
}

/// Whether text in `language` is already in the target language.
pub fn is_portuguese(language: &str) -> bool {
    matches!(language, "pt" | "pt-BR" | "pt-br")
}

/// Picks and translates provider text.
#[derive(Clone)]
pub struct Localizer {
    chain: TranslationChain,
}

impl Localizer {
    pub fn new(chain: TranslationChain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &TranslationChain {
        &self.chain
    }

    /// Pick the best entry and translate it when it is not Portuguese.
    pub async fn text<T: LocalizedEntry>(
        &self,
        entries: &[T],
        text: impl Fn(&T) -> &str,
        default: &str,
        verify_tls: bool,
    ) -> (LocalizedText, Translation) {
        let picked = pick_text(entries, text, default);
        let translation = match picked.language.as_deref() {
            Some(language) => self.chain.translate(&picked.text, language, verify_tls).await,
            None => Translation::unchanged(&picked.text),
        };
        (picked, translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::NamedResource;

    fn name(text: &str, lang: &str) -> RawName {
        RawName {
            name: text.into(),
            language: NamedResource {
                name: lang.into(),
                url: String::new(),
            },
        }
    }

    #[test]
    fn test_pick_follows_preference_order() {
        let entries = vec![
            name("Pikachu", "en"),
            name("ピカチュウ", "ja"),
            name("Pikachu (es)", "es"),
        ];
        assert_eq!(pick(&entries).unwrap().name, "Pikachu (es)");

        let entries = vec![name("Pikachu", "en"), name("Pikachu BR", "pt-BR")];
        assert_eq!(pick(&entries).unwrap().name, "Pikachu BR");
    }

    #[test]
    fn test_pick_falls_back_to_first_then_default() {
        let entries = vec![name("ピカチュウ", "ja"), name("皮卡丘", "zh-Hans")];
        assert_eq!(pick(&entries).unwrap().name, "ピカチュウ");

        let empty: Vec<RawName> = Vec::new();
        assert!(pick(&empty).is_none());
        assert_eq!(pick_name(&empty, |n| n.name.as_str(), "pikachu"), "pikachu");

        let text = pick_text(&empty, |n| n.name.as_str(), "");
        assert_eq!(text.language, None);
    }

    #[test]
    fn test_pick_text_strips_control_characters() {
        let entries = vec![name("When several of\nthese POKéMON\x0cgather, their\nelectricity ", "en")];
        let text = pick_text(&entries, |n| n.name.as_str(), "");
        assert_eq!(
            text.text,
            "When several of these POKéMON gather, their electricity"
        );
        assert_eq!(text.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_clean_text_keeps_inner_spacing() {
        assert_eq!(clean_text("Fire  power\nrises\r\n"), "Fire  power rises");
        assert_eq!(clean_text("a\x0c\x0cb"), "a  b");
        assert_eq!(clean_text("  \n"), "");
    }

    #[test]
    fn test_pick_name_keeps_text() {
        let entries = vec![name(" Mr. Mime\n", "en")];
        assert_eq!(pick_name(&entries, |n| n.name.as_str(), ""), " Mr. Mime\n");
    }

    #[test]
    fn test_portuguese_detection() {
        assert!(is_portuguese("pt-BR"));
        assert!(is_portuguese("pt"));
        assert!(!is_portuguese("es"));
    }
}
