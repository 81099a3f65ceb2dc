// ABOUTME: Log streaming trait and options shared by both runtime modes.
// ABOUTME: Logs are exposed as a raw byte stream; callers decide how much to read.

use crate::types::ContainerId;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;

/// A stream of log chunks as produced by the engine.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, LogError>> + Send>>;

#[async_trait]
pub trait LogOps: Send + Sync {
    /// Stream logs from a container.
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<ByteStream, LogError>;
}

/// Options for log streaming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Number of lines from the end, or `"all"`. `None` means all.
    pub tail: Option<String>,
    /// Unix seconds, RFC 3339 timestamp, or a relative age like `10m`.
    pub since: Option<String>,
    /// Follow log output (like `tail -f`).
    pub follow: bool,
}

impl LogOptions {
    /// Create options for tailing the last N lines.
    pub fn tail(n: u64) -> Self {
        Self {
            tail: Some(n.to_string()),
            ..Default::default()
        }
    }

    /// The tail value in the engine's query syntax.
    pub fn tail_param(&self) -> Result<String, LogError> {
        match self.tail.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok("all".to_string()),
            Some(n) => n
                .parse::<u64>()
                .map(|n| n.to_string())
                .map_err(|_| LogError::InvalidOption(format!("tail must be a number or \"all\": {n}"))),
        }
    }

    /// The `since` bound as unix seconds, if any.
    pub fn since_unix(&self, now: DateTime<Utc>) -> Result<Option<i64>, LogError> {
        match self.since.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => parse_since(s, now).map(Some),
        }
    }
}

fn parse_since(input: &str, now: DateTime<Utc>) -> Result<i64, LogError> {
    if let Ok(secs) = input.parse::<i64>() {
        return Ok(secs);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.timestamp());
    }

    let invalid = || LogError::InvalidOption(format!("unrecognised since value: {input}"));
    let split = input.len().checked_sub(1).ok_or_else(invalid)?;
    let (amount, unit) = input.split_at(split);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;
    let seconds = match unit {
        "s" => amount,
        "m" => amount * 60,
        "h" => amount * 3600,
        "d" => amount * 86_400,
        _ => return Err(invalid()),
    };
    Ok(now.timestamp() - seconds)
}

/// Errors from log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid log option: {0}")]
    InvalidOption(String),

    #[error("stream error: {0}")]
    StreamError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_defaults_to_all() {
        assert_eq!(LogOptions::default().tail_param().unwrap(), "all");
        assert_eq!(LogOptions::tail(100).tail_param().unwrap(), "100");
    }

    #[test]
    fn tail_rejects_garbage() {
        let opts = LogOptions {
            tail: Some("lots".to_string()),
            ..Default::default()
        };
        assert!(opts.tail_param().is_err());
    }

    #[test]
    fn since_accepts_absolute_and_relative_forms() {
        let now = DateTime::parse_from_rfc3339("2024-01-01T00:10:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let at = |s: &str| {
            LogOptions {
                since: Some(s.to_string()),
                ..Default::default()
            }
            .since_unix(now)
            .unwrap()
        };

        assert_eq!(at("1700000000"), Some(1_700_000_000));
        assert_eq!(at("2024-01-01T00:00:00Z"), Some(1_704_067_200));
        assert_eq!(at("10m"), Some(1_704_067_200));
        assert_eq!(LogOptions::default().since_unix(now).unwrap(), None);
    }
}
