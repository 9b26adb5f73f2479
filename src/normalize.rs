// 🧹 Field Normalization - canonical keys for names, positions, organizations
// Normalization is a pluggable strategy: any pure function of (field kind, raw value)
// can replace the built-in ones without touching grouping or tagging.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// FIELD KINDS
// ============================================================================

/// Which identity field a value belongs to
///
/// Rules are chosen per kind and never merge values across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldKind {
    Name,
    Position,
    Organization,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [FieldKind::Name, FieldKind::Position, FieldKind::Organization];

    pub fn name(&self) -> &str {
        match self {
            FieldKind::Name => "name",
            FieldKind::Position => "position",
            FieldKind::Organization => "organization",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of normalizing one raw value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NormalizedField {
    Known(String),
    /// Missing or unusable value. Never equal to anything for grouping purposes.
    Unknown,
}

impl NormalizedField {
    pub fn is_unknown(&self) -> bool {
        matches!(self, NormalizedField::Unknown)
    }

    pub fn as_known(&self) -> Option<&str> {
        match self {
            NormalizedField::Known(value) => Some(value),
            NormalizedField::Unknown => None,
        }
    }

    pub fn into_known(self) -> Option<String> {
        match self {
            NormalizedField::Known(value) => Some(value),
            NormalizedField::Unknown => None,
        }
    }

    fn from_text(text: String) -> Self {
        if text.is_empty() {
            NormalizedField::Unknown
        } else {
            NormalizedField::Known(text)
        }
    }
}

// ============================================================================
// STRATEGY TRAIT
// ============================================================================

/// Pure mapping from a raw field value to its canonical form
pub trait FieldNormalizer {
    fn normalize(&self, kind: FieldKind, raw: Option<&str>) -> NormalizedField;
}

impl<F> FieldNormalizer for F
where
    F: Fn(FieldKind, Option<&str>) -> NormalizedField,
{
    fn normalize(&self, kind: FieldKind, raw: Option<&str>) -> NormalizedField {
        self(kind, raw)
    }
}

/// Built-in strategies, selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NormalizerKind {
    /// Trim, collapse whitespace, lowercase
    Basic,
    /// Basic plus punctuation stripping, honorifics and abbreviation expansion
    #[default]
    Standard,
}

impl NormalizerKind {
    pub fn name(&self) -> &str {
        match self {
            NormalizerKind::Basic => "basic",
            NormalizerKind::Standard => "standard",
        }
    }

    pub fn build(&self) -> Box<dyn FieldNormalizer> {
        match self {
            NormalizerKind::Basic => Box::new(BasicNormalizer),
            NormalizerKind::Standard => Box::new(StandardNormalizer),
        }
    }
}

// ============================================================================
// BASIC STRATEGY
// ============================================================================

/// Placeholder values that spreadsheet exports use for empty cells
const PLACEHOLDERS: [&str; 4] = ["nan", "null", "none", "n/a"];

/// Trim, collapse internal whitespace runs and lowercase
///
/// Returns `None` for missing, blank or placeholder input.
pub fn fold_whitespace_and_case(raw: Option<&str>) -> Option<String> {
    let folded = raw?
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if folded.is_empty() || PLACEHOLDERS.contains(&folded.as_str()) {
        None
    } else {
        Some(folded)
    }
}

pub struct BasicNormalizer;

impl FieldNormalizer for BasicNormalizer {
    fn normalize(&self, _kind: FieldKind, raw: Option<&str>) -> NormalizedField {
        match fold_whitespace_and_case(raw) {
            Some(text) => NormalizedField::Known(text),
            None => NormalizedField::Unknown,
        }
    }
}

// ============================================================================
// STANDARD STRATEGY
// ============================================================================

const HONORIFICS: [&str; 7] = ["mr", "mrs", "ms", "miss", "dr", "hon", "prof"];

/// Abbreviations expanded in positions and organizations (matched per word)
const ABBREVIATIONS: [(&str, &str); 22] = [
    ("dept", "department"),
    ("min", "minister"),
    ("asst", "assistant"),
    ("assoc", "associate"),
    ("govt", "government"),
    ("gov", "government"),
    ("mgr", "manager"),
    ("dir", "director"),
    ("exec", "executive"),
    ("chr", "chair"),
    ("vp", "vice president"),
    ("natl", "national"),
    ("intl", "international"),
    ("cttee", "committee"),
    ("cmte", "committee"),
    ("comm", "commission"),
    ("corp", "corporation"),
    ("bd", "board"),
    ("svcs", "services"),
    ("sr", "senior"),
    ("jr", "junior"),
    ("dep", "deputy"),
];

pub struct StandardNormalizer;

impl StandardNormalizer {
    fn strip_punctuation(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => out.push_str(" and "),
                '-' | '/' | '_' | '\u{2013}' | '\u{2014}' => out.push(' '),
                '.' | ',' | '\'' | '"' | '(' | ')' | '[' | ']' | '{' | '}' | ':' | ';' | '!'
                | '?' | '`' | '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}' => {}
                other => out.push(other),
            }
        }
        out
    }

    fn expand(word: &str) -> &str {
        ABBREVIATIONS
            .iter()
            .find(|(abbr, _)| *abbr == word)
            .map(|(_, full)| *full)
            .unwrap_or(word)
    }

    fn normalize_words(kind: FieldKind, text: &str) -> String {
        let words: Vec<&str> = text.split_whitespace().collect();

        match kind {
            FieldKind::Name => {
                // Drop leading honorifics but never the whole name
                let mut start = 0;
                while start + 1 < words.len() && HONORIFICS.contains(&words[start]) {
                    start += 1;
                }
                words[start..].join(" ")
            }
            FieldKind::Position | FieldKind::Organization => words
                .iter()
                .map(|w| Self::expand(w))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl FieldNormalizer for StandardNormalizer {
    fn normalize(&self, kind: FieldKind, raw: Option<&str>) -> NormalizedField {
        let folded = match fold_whitespace_and_case(raw) {
            Some(text) => text,
            None => return NormalizedField::Unknown,
        };

        let stripped = Self::strip_punctuation(&folded);
        NormalizedField::from_text(Self::normalize_words(kind, &stripped))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn known(value: &str) -> NormalizedField {
        NormalizedField::Known(value.to_string())
    }

    #[test]
    fn test_blank_values_are_unknown() {
        for normalizer in [NormalizerKind::Basic.build(), NormalizerKind::Standard.build()] {
            assert!(normalizer.normalize(FieldKind::Name, None).is_unknown());
            assert!(normalizer.normalize(FieldKind::Name, Some("")).is_unknown());
            assert!(normalizer.normalize(FieldKind::Position, Some("   \t ")).is_unknown());
            assert!(normalizer.normalize(FieldKind::Organization, Some("NaN")).is_unknown());
        }
    }

    #[test]
    fn test_basic_folds_case_and_whitespace() {
        let n = BasicNormalizer;
        assert_eq!(
            n.normalize(FieldKind::Name, Some("  Alice    SMITH ")),
            known("alice smith")
        );
        // Basic keeps punctuation
        assert_eq!(
            n.normalize(FieldKind::Organization, Some("Dept. of Health")),
            known("dept. of health")
        );
    }

    #[test]
    fn test_standard_expands_abbreviations() {
        let n = StandardNormalizer;
        assert_eq!(
            n.normalize(FieldKind::Organization, Some("Dept. of Health")),
            n.normalize(FieldKind::Organization, Some("department of   health")),
        );
        assert_eq!(
            n.normalize(FieldKind::Position, Some("Asst. Dep. Minister")),
            known("assistant deputy minister")
        );
        assert_eq!(
            n.normalize(FieldKind::Organization, Some("Arts & Culture Bd")),
            known("arts and culture board")
        );
    }

    #[test]
    fn test_standard_strips_name_honorifics() {
        let n = StandardNormalizer;
        assert_eq!(n.normalize(FieldKind::Name, Some("Dr. Jane O'Neil")), known("jane oneil"));
        assert_eq!(n.normalize(FieldKind::Name, Some("Hon. Mr. John Doe")), known("john doe"));
        // A lone honorific stays so the name is not lost
        assert_eq!(n.normalize(FieldKind::Name, Some("Dr.")), known("dr"));
    }

    #[test]
    fn test_name_rules_do_not_expand_abbreviations() {
        let n = StandardNormalizer;
        // "Dir" is a surname here, not "director"
        assert_eq!(n.normalize(FieldKind::Name, Some("Anna Dir")), known("anna dir"));
        assert_eq!(n.normalize(FieldKind::Position, Some("Dir")), known("director"));
    }

    #[test]
    fn test_punctuation_only_is_unknown() {
        let n = StandardNormalizer;
        assert!(n.normalize(FieldKind::Position, Some("...")).is_unknown());
    }

    #[test]
    fn test_closure_is_a_normalizer() {
        let exact = |_kind: FieldKind, raw: Option<&str>| match raw {
            Some(value) if !value.is_empty() => NormalizedField::Known(value.to_string()),
            _ => NormalizedField::Unknown,
        };

        assert_eq!(exact.normalize(FieldKind::Name, Some("Alice")), known("Alice"));
        assert_ne!(
            exact.normalize(FieldKind::Name, Some("Alice")),
            exact.normalize(FieldKind::Name, Some("alice"))
        );
    }

    #[test]
    fn test_normalization_is_pure() {
        let n = StandardNormalizer;
        let first = n.normalize(FieldKind::Organization, Some("Min. of Finance"));
        let second = n.normalize(FieldKind::Organization, Some("Min. of Finance"));
        assert_eq!(first, second);
        assert_eq!(first, known("minister of finance"));
    }
}
