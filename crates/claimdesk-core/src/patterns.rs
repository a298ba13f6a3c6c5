//! Shared detection patterns.
//!
//! Regexes used by the coverage policy and the response normalizer. The
//! vocabularies cover the languages claim documents arrive in: English,
//! German and Turkish.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // =========================================================================
    // EXTERNAL DAMAGE VOCABULARY
    // =========================================================================

    /// Collision, impact, accident and external-damage markers.
    ///
    /// A failure described with any of these is not a product defect, so no
    /// extended contract can cover it.
    pub static ref EXTERNAL_DAMAGE_PATTERN: Regex = Regex::new(
        r"(?i)\b(external\s+damages?|collisions?|impact(?:s|ed)?|accidents?|crash(?:es|ed)?|vandalism|unfall\w*|aufprall\w*|kollision\w*|fremdeinwirkung|fremdschaden\w*|steinschlag\w*|kaza(?:sı|sında|da|dan|ya|lı)?|çarpma\w*|çarpış\w*|darbe\w*|(?:dış|dis|harici)\s+hasar\w*)\b"
    ).unwrap();

    // =========================================================================
    // RESPONSE PARSING PATTERNS
    // =========================================================================

    /// Legacy bilingual annotation: `Original: <text> | TR: <text>`.
    pub static ref LEGACY_BILINGUAL_PATTERN: Regex = Regex::new(
        r"(?is)^\s*(?:original|orijinal)\s*:\s*(?P<original>.*?)\s*\|\s*tr\s*:\s*(?P<translated>.*?)\s*$"
    ).unwrap();

    /// First number in a string, allowing `.`, `,` and space as thousands
    /// separators (`123.456 km`, `12 500`).
    pub static ref NUMBER_PATTERN: Regex = Regex::new(
        r"\d+(?:[., ]\d{3})*"
    ).unwrap();
}

/// Check if text describes externally caused damage.
pub fn mentions_external_damage(text: &str) -> bool {
    EXTERNAL_DAMAGE_PATTERN.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_damage_english() {
        assert!(mentions_external_damage("External damage on turbo housing"));
        assert!(mentions_external_damage("Radiator cracked after collision"));
        assert!(mentions_external_damage("Stone IMPACT on windscreen"));
        assert!(!mentions_external_damage("Injector internal leakage"));
    }

    #[test]
    fn test_external_damage_german_and_turkish() {
        assert!(mentions_external_damage("Unfallschaden an der Stoßstange"));
        assert!(mentions_external_damage("Kaza sonrası hasar tespiti"));
        assert!(mentions_external_damage("Turbo gövdesinde dış hasar"));
        assert!(!mentions_external_damage("Takometre sensörü arızası"));
    }

    #[test]
    fn test_external_damage_needs_whole_word() {
        assert!(mentions_external_damage("Araç kazada hasar gördü"));
        assert!(mentions_external_damage("Kazalı araç, dış hasarı mevcut"));
        assert!(mentions_external_damage("Impacted by debris"));
        assert!(!mentions_external_damage("Kazan arızası, su sızıntısı"));
        assert!(!mentions_external_damage("Crankshaft bearing impactor wear"));
    }

    #[test]
    fn test_legacy_bilingual_pattern() {
        let caps = LEGACY_BILINGUAL_PATTERN
            .captures("Original: Tachometer Geber auswechseln | TR: Takometre sensörü değişimi")
            .unwrap();
        assert_eq!(&caps["original"], "Tachometer Geber auswechseln");
        assert_eq!(&caps["translated"], "Takometre sensörü değişimi");
    }

    #[test]
    fn test_number_pattern() {
        let m = NUMBER_PATTERN.find("KM-Stand: 123.456 km").unwrap();
        assert_eq!(m.as_str(), "123.456");
    }
}
