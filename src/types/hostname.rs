// ABOUTME: Fully qualified hostname validation for routed domains.
// ABOUTME: Hostnames are pasted into proxy rules, so only DNS characters pass.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostnameError {
    #[error("hostname cannot be empty")]
    Empty,

    #[error("hostname is longer than 255 bytes")]
    TooLong,

    #[error("hostname must be fully qualified (at least two labels)")]
    NotQualified,

    #[error("hostname label {0:?} must be 1 to 63 characters")]
    LabelLength(String),

    #[error("hostname label {0:?} cannot start or end with a hyphen")]
    EdgeHyphen(String),

    #[error("invalid character in hostname: '{0}'")]
    InvalidChar(char),

    #[error("top-level label {0:?} must start with a letter")]
    TopLevel(String),
}

/// A lowercase fully qualified domain name, without the trailing dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hostname(String);

impl Hostname {
    pub fn new(value: &str) -> Result<Self, HostnameError> {
        let value = value.trim();
        let value = value.strip_suffix('.').unwrap_or(value);
        if value.is_empty() {
            return Err(HostnameError::Empty);
        }
        if value.len() > MAX_LEN {
            return Err(HostnameError::TooLong);
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
        {
            return Err(HostnameError::InvalidChar(c));
        }

        let labels: Vec<&str> = value.split('.').collect();
        if labels.len() < 2 {
            return Err(HostnameError::NotQualified);
        }
        for label in &labels {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(HostnameError::LabelLength(label.to_string()));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(HostnameError::EdgeHyphen(label.to_string()));
            }
        }
        if let Some(tld) = labels.last()
            && !tld.starts_with(|c: char| c.is_ascii_alphabetic())
        {
            return Err(HostnameError::TopLevel(tld.to_string()));
        }

        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Hostname {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Hostname {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hostname::new(&s).map_err(serde::de::Error::custom)
    }
}
