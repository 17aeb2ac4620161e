//! Language/country pairs for `Content-Language` and `Accept-Language`.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::Error;

/// A locale such as `en-US`, or a bare language such as `fr`.
///
/// Parsing accepts `-` or `_` as the separator; the language is lower-cased
/// and the country upper-cased.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq)]
#[serde(try_from = "String")]
pub struct Locale {
    language: String,
    country: Option<String>,
}

impl Locale {
    pub fn new(language: &str, country: Option<&str>) -> Result<Self, Error> {
        let valid = |s: &str, len: std::ops::RangeInclusive<usize>| {
            len.contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric())
        };
        if !valid(language, 2..=8) || !language.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::InvalidLocale(language.to_owned()));
        }
        if let Some(country) = country {
            if !valid(country, 2..=3) {
                return Err(Error::InvalidLocale(format!("{language}-{country}")));
            }
        }
        Ok(Self {
            language: language.to_ascii_lowercase(),
            country: country.map(str::to_ascii_uppercase),
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    /// Picks the highest-weighted locale from an `Accept-Language` value.
    ///
    /// `*`, malformed tags and `q=0` entries are skipped. Ties keep the order
    /// the client sent.
    pub fn from_accept_language(header: &str) -> Option<Self> {
        let mut best: Option<(f32, Locale)> = None;
        for entry in header.split(',') {
            let mut parts = entry.split(';').map(str::trim);
            let Some(tag) = parts.next().filter(|t| !t.is_empty() && *t != "*") else {
                continue;
            };
            let q = parts
                .find_map(|p| p.strip_prefix("q="))
                .map_or(Some(1.0), |q| q.parse::<f32>().ok());
            let (Some(q), Ok(locale)) = (q, tag.parse::<Locale>()) else {
                continue;
            };
            if q > 0.0 && best.as_ref().is_none_or(|(b, _)| q > *b) {
                best = Some((q, locale));
            }
        }
        best.map(|(_, locale)| locale)
    }
}

/// `en-US`.
impl Default for Locale {
    fn default() -> Self {
        Self { language: "en".to_owned(), country: Some("US".to_owned()) }
    }
}

impl FromStr for Locale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, ['-', '_']);
        let language = parts.next().unwrap_or_default();
        let country = parts.next();
        Self::new(language, country)
    }
}

impl TryFrom<String> for Locale {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.country {
            Some(country) => write!(f, "{}-{}", self.language, country),
            None => f.write_str(&self.language),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_separators() {
        let a: Locale = "en-us".parse().unwrap();
        let b: Locale = "EN_US".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "en-US");
        assert_eq!(a.language(), "en");
        assert_eq!(a.country(), Some("US"));
    }

    #[test]
    fn bare_language() {
        let l: Locale = "fr".parse().unwrap();
        assert_eq!(l.country(), None);
        assert_eq!(l.to_string(), "fr");
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Locale>().is_err());
        assert!("e".parse::<Locale>().is_err());
        assert!("12-US".parse::<Locale>().is_err());
        assert!("en-U".parse::<Locale>().is_err());
    }

    #[test]
    fn accept_language_picks_highest_weight() {
        let l = Locale::from_accept_language("da, en-GB;q=0.8, en;q=0.7").unwrap();
        assert_eq!(l.to_string(), "da");

        let l = Locale::from_accept_language("en;q=0.5, de-DE;q=0.9, *;q=1").unwrap();
        assert_eq!(l.to_string(), "de-DE");

        assert!(Locale::from_accept_language("*").is_none());
        assert!(Locale::from_accept_language("en;q=0").is_none());
    }
}
