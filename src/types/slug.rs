// ABOUTME: URL- and DNS-safe slug validation for service names.
// ABOUTME: Slugs feed container names and reverse-proxy router names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MIN_LEN: usize = 2;
const MAX_LEN: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug must be between 2 and 100 characters")]
    Length,

    #[error("slug cannot start or end with a hyphen")]
    EdgeHyphen,

    #[error("invalid character in slug: '{0}'")]
    InvalidChar(char),
}

/// Lowercase alphanumerics separated by single hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slug(String);

impl Slug {
    pub fn new(value: &str) -> Result<Self, SlugError> {
        if !(MIN_LEN..=MAX_LEN).contains(&value.len()) {
            return Err(SlugError::Length);
        }

        if value.starts_with('-') || value.ends_with('-') {
            return Err(SlugError::EdgeHyphen);
        }

        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(SlugError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Slug {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Slug::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_slugs() {
        assert!(Slug::new("web").is_ok());
        assert!(Slug::new("api-v2").is_ok());
    }

    #[test]
    fn rejects_bad_slugs() {
        assert_eq!(Slug::new("a"), Err(SlugError::Length));
        assert_eq!(Slug::new("-web"), Err(SlugError::EdgeHyphen));
        assert_eq!(Slug::new("Web"), Err(SlugError::InvalidChar('W')));
        assert_eq!(Slug::new("my_app"), Err(SlugError::InvalidChar('_')));
    }
}
