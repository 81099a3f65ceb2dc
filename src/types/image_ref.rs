// ABOUTME: Container image reference parsing and validation.
// ABOUTME: Handles formats like nginx, nginx:tag, registry:5000/image:tag@digest.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// A parsed image reference as accepted by the container engine.
///
/// References without a tag or digest resolve to `:latest`, which is what the
/// engine itself would pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    registry: Option<String>,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '-' | '_' | '@')))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        let (name_part, digest) = match input.split_once('@') {
            Some((_, "")) => return Err(ParseImageRefError::InvalidFormat(input.to_string())),
            Some((before, after)) => (before, Some(after.to_string())),
            None => (input, None),
        };

        // A colon after the last slash separates the tag; one before it is a
        // registry port.
        let last_slash = name_part.rfind('/').map_or(0, |i| i + 1);
        let (without_tag, tag) = match name_part[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                let tag = &name_part[split + 1..];
                if tag.is_empty() {
                    return Err(ParseImageRefError::InvalidFormat(input.to_string()));
                }
                (&name_part[..split], Some(tag.to_string()))
            }
            None => (name_part, None),
        };

        let (registry, repository) = split_registry(without_tag);
        if repository.is_empty() || repository.split('/').any(str::is_empty) {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        let tag = match (&tag, &digest) {
            (None, None) => Some("latest".to_string()),
            _ => tag,
        };

        Ok(Self {
            registry,
            repository: repository.to_string(),
            tag,
            digest,
        })
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

/// The first path component names a registry when it looks like a host.
fn split_registry(input: &str) -> (Option<String>, &str) {
    match input.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (Some(first.to_string()), rest)
        }
        _ => (None, input),
    }
}

impl FromStr for ImageRef {
    type Err = ParseImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref registry) = self.registry {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}", self.repository)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}
