//! Text normalization and classification helpers.
//!
//! The standardization analyzer reports on what normalization *would* do;
//! nothing here writes normalized values back into the source table. All
//! three transforms are idempotent: applying one twice equals applying it
//! once.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters tolerated in descriptions and categorical fields beyond
/// letters, digits and whitespace.
const ALLOWED_PUNCTUATION: [char; 8] = ['-', '.', ',', '/', '"', '\'', '(', ')'];

static REPEATED_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("static regex"));

/// Casing pattern of a text value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CasingPattern {
    /// Every cased character is uppercase.
    AllUpper,
    /// Every cased character is lowercase.
    AllLower,
    /// Each word starts uppercase, continues lowercase.
    TitleCase,
    /// Anything else (mixed casing mid-word, etc.).
    Irregular,
}

impl CasingPattern {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AllUpper => "all-upper",
            Self::AllLower => "all-lower",
            Self::TitleCase => "title-case",
            Self::Irregular => "irregular",
        }
    }
}

/// Classify the casing pattern of a value (leading/trailing whitespace is
/// ignored for classification purposes).
pub fn classify_casing(value: &str) -> CasingPattern {
    let v = value.trim();
    if v == v.to_uppercase() {
        return CasingPattern::AllUpper;
    }
    if v == v.to_lowercase() {
        return CasingPattern::AllLower;
    }
    if v == title_case(v) {
        return CasingPattern::TitleCase;
    }
    CasingPattern::Irregular
}

/// Title-case a string: first letter of each whitespace-separated word
/// uppercased, the rest lowercased.
pub fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            result.push(c);
        } else if at_word_start {
            result.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            result.extend(c.to_lowercase());
        }
    }
    result
}

/// Trim transform: strip leading and trailing whitespace.
pub fn trim(value: &str) -> String {
    value.trim().to_string()
}

/// Case-fold transform: uppercase, the canonical form for categorical
/// comparison.
pub fn case_fold(value: &str) -> String {
    value.to_uppercase()
}

/// Whitespace-collapse transform: any run of whitespace becomes a single
/// space.
pub fn collapse_whitespace(value: &str) -> String {
    REPEATED_WHITESPACE.replace_all(value, " ").into_owned()
}

/// Canonical form used for categorical-variant reduction: trim + uppercase.
pub fn canonicalize(value: &str) -> String {
    case_fold(&trim(value))
}

/// Normalized form used for description grouping: trim + lowercase.
pub fn normalize_description(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Whether a value is blank: empty or whitespace-only.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Incidental defects a single string can carry. Counted independently, so
/// one value may trigger several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDefects {
    pub leading_whitespace: bool,
    pub trailing_whitespace: bool,
    pub repeated_whitespace: bool,
    pub special_characters: bool,
}

impl TextDefects {
    pub fn any(&self) -> bool {
        self.leading_whitespace
            || self.trailing_whitespace
            || self.repeated_whitespace
            || self.special_characters
    }
}

/// Detect incidental defects in a value.
pub fn detect_defects(value: &str) -> TextDefects {
    let trimmed_start = value.trim_start();
    let trimmed_end = value.trim_end();
    TextDefects {
        leading_whitespace: trimmed_start.len() != value.len(),
        trailing_whitespace: trimmed_end.len() != value.len(),
        repeated_whitespace: REPEATED_WHITESPACE.is_match(value.trim()),
        special_characters: value
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace() && !ALLOWED_PUNCTUATION.contains(&c)),
    }
}
