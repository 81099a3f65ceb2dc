// ABOUTME: Container restart policy attached to a service.
// ABOUTME: Supports no, always, unless-stopped, and on-failure[:max-retries].

use serde::de::{Deserialize, Deserializer};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    /// Restarts disabled.
    No,
    Always,
    #[default]
    UnlessStopped,
    OnFailure {
        max_retries: Option<u32>,
    },
}

impl RestartPolicy {
    /// Parse a stored policy string, mapping anything unrecognised to
    /// [`RestartPolicy::No`] rather than a policy that would restart.
    pub fn from_str_lossy(s: &str) -> Self {
        s.parse().unwrap_or_else(|err| {
            tracing::warn!(policy = s, %err, "unrecognised restart policy, restarts disabled");
            RestartPolicy::No
        })
    }
}

impl FromStr for RestartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no" => Ok(RestartPolicy::No),
            "always" => Ok(RestartPolicy::Always),
            "unless-stopped" => Ok(RestartPolicy::UnlessStopped),
            "on-failure" => Ok(RestartPolicy::OnFailure { max_retries: None }),
            s if s.starts_with("on-failure:") => {
                let retries_str = &s["on-failure:".len()..];
                let retries = retries_str
                    .parse::<u32>()
                    .map_err(|_| format!("invalid max retries: {}", retries_str))?;
                Ok(RestartPolicy::OnFailure {
                    max_retries: Some(retries),
                })
            }
            _ => Err(format!("unknown restart policy: {}", s)),
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::No => write!(f, "no"),
            RestartPolicy::Always => write!(f, "always"),
            RestartPolicy::UnlessStopped => write!(f, "unless-stopped"),
            RestartPolicy::OnFailure { max_retries: None } => write!(f, "on-failure"),
            RestartPolicy::OnFailure {
                max_retries: Some(n),
            } => write!(f, "on-failure:{}", n),
        }
    }
}

impl Serialize for RestartPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RestartPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(RestartPolicy::from_str_lossy(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_policies() {
        assert_eq!("always".parse(), Ok(RestartPolicy::Always));
        assert_eq!(
            "on-failure:5".parse(),
            Ok(RestartPolicy::OnFailure {
                max_retries: Some(5)
            })
        );
    }

    #[test]
    fn unknown_policy_disables_restarts() {
        assert_eq!(RestartPolicy::from_str_lossy("sometimes"), RestartPolicy::No);
        assert_eq!(RestartPolicy::from_str_lossy(""), RestartPolicy::No);
    }

    #[test]
    fn deserializes_lossily() {
        let policy: RestartPolicy = serde_json::from_str("\"bogus\"").unwrap();
        assert_eq!(policy, RestartPolicy::No);
        let policy: RestartPolicy = serde_json::from_str("\"unless-stopped\"").unwrap();
        assert_eq!(policy, RestartPolicy::UnlessStopped);
    }
}
