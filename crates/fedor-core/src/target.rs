use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FedorError, Result};

/// One review target: a pull request on a repository.
///
/// Its `Display` form (`owner/repo#42`) is the debounce key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Full repository name, `owner/repo`.
    pub repo: String,
    pub pr: u64,
}

impl Target {
    pub fn new(repo: impl Into<String>, pr: u64) -> Self {
        Self {
            repo: repo.into(),
            pr,
        }
    }

    /// Build a target from a CLI-style `owner/repo` + number pair, rejecting
    /// repository names that are not exactly `owner/name`.
    pub fn parse_parts(repo: &str, pr: u64) -> Result<Self> {
        let mut parts = repo.split('/');
        let valid = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        );
        if !valid {
            return Err(FedorError::InvalidTarget(repo.to_string()));
        }
        Ok(Self::new(repo, pr))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.pr)
    }
}

impl FromStr for Target {
    type Err = FedorError;

    fn from_str(s: &str) -> Result<Self> {
        let (repo, pr) = s
            .rsplit_once('#')
            .ok_or_else(|| FedorError::InvalidTarget(s.to_string()))?;
        let pr = pr
            .parse::<u64>()
            .map_err(|_| FedorError::InvalidTarget(s.to_string()))?;
        Self::parse_parts(repo, pr).map_err(|_| FedorError::InvalidTarget(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_debounce_key() {
        assert_eq!(Target::new("acme/repo", 42).to_string(), "acme/repo#42");
    }

    #[test]
    fn parse_round_trips_display() {
        let t: Target = "acme/repo#42".parse().unwrap();
        assert_eq!(t, Target::new("acme/repo", 42));
    }

    #[test]
    fn parse_rejects_malformed_keys() {
        for bad in ["acme/repo", "acme#1", "acme/repo#x", "/repo#1", "a/b/c#1", "acme/#3"] {
            assert!(bad.parse::<Target>().is_err(), "{bad} should be rejected");
        }
    }
}
