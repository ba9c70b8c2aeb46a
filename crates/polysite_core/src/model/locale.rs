//! Locale value object.
//!
//! # Responsibility
//! - Parse and normalize `language[_REGION]` identifiers.
//! - Render the canonical `de_CH` form used as the section lookup key.
//!
//! # Invariants
//! - `language` is 2-3 lowercase ASCII letters.
//! - `region`, when present, is 2 uppercase ASCII letters or a 3-digit area code.
//! - A `Locale` is immutable once constructed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static LOCALE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{2,3})(?:[_-]([A-Za-z]{2}|[0-9]{3}))?$").expect("valid locale regex")
});

/// Rejected locale input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocaleParseError {
    /// Input is blank after trim.
    Empty,
    /// Input does not have `language[_REGION]` shape.
    Malformed(String),
}

impl Display for LocaleParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "locale must not be empty"),
            Self::Malformed(value) => write!(
                f,
                "invalid locale `{value}`; expected language[_REGION], e.g. `de_CH`"
            ),
        }
    }
}

impl Error for LocaleParseError {}

/// Language plus optional region, e.g. `de_CH` or `fr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale {
    language: String,
    region: Option<String>,
}

impl Locale {
    /// Builds a locale from separate components, normalizing case.
    pub fn new(language: &str, region: Option<&str>) -> Result<Self, LocaleParseError> {
        match region {
            Some(region) => Self::parse(&format!("{language}_{region}")),
            None => Self::parse(language),
        }
    }

    /// Parses `de`, `de_CH` or `de-CH` (any case).
    pub fn parse(value: &str) -> Result<Self, LocaleParseError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LocaleParseError::Empty);
        }

        let captures = LOCALE_RE
            .captures(trimmed)
            .ok_or_else(|| LocaleParseError::Malformed(trimmed.to_string()))?;
        let language = captures[1].to_ascii_lowercase();
        let region = captures
            .get(2)
            .map(|region| region.as_str().to_ascii_uppercase());

        Ok(Self { language, region })
    }

    /// Lowercase language code.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Uppercase region code, if any.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Canonical `language_REGION` key.
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl Display for Locale {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}_{}", self.language, region),
            None => write!(f, "{}", self.language),
        }
    }
}

impl FromStr for Locale {
    type Err = LocaleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Locale {
    type Error = LocaleParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Locale> for String {
    fn from(value: Locale) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{Locale, LocaleParseError};

    #[test]
    fn parse_normalizes_case_and_separator() {
        let locale = Locale::parse(" DE-ch ").expect("locale should parse");
        assert_eq!(locale.language(), "de");
        assert_eq!(locale.region(), Some("CH"));
        assert_eq!(locale.to_string(), "de_CH");
    }

    #[test]
    fn parse_accepts_language_only_and_numeric_region() {
        let language_only = Locale::parse("fr").expect("language-only locale");
        assert_eq!(language_only.region(), None);
        assert_eq!(language_only.code(), "fr");

        let latam = Locale::parse("es_419").expect("numeric region");
        assert_eq!(latam.region(), Some("419"));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert_eq!(Locale::parse("   "), Err(LocaleParseError::Empty));
        assert!(matches!(
            Locale::parse("german_Switzerland"),
            Err(LocaleParseError::Malformed(_))
        ));
        assert!(matches!(
            Locale::parse("d_CH"),
            Err(LocaleParseError::Malformed(_))
        ));
    }

    #[test]
    fn new_matches_parse() {
        let built = Locale::new("DE", Some("ch")).expect("components should build");
        assert_eq!(built, Locale::parse("de_CH").expect("locale should parse"));
    }
}
