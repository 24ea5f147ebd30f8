//! Minimum `bw` version enforcement.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::{BitwardenError, Result};

/// Oldest `bw` release known to behave the way this crate expects.
pub const MIN_SUPPORTED_VERSION: CliVersion = CliVersion::new(1, 22, 0);

/// A `major.minor.patch` version as printed by `bw --version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CliVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl CliVersion {
    /// Creates a version from its components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for CliVersion {
    type Err = BitwardenError;

    /// Parses `1.22.0`, `v1.22.0`, `1.22` or `2024.1.0-beta`. Anything after
    /// the numeric core is ignored.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let core = trimmed
            .strip_prefix('v')
            .unwrap_or(trimmed)
            .split(|c: char| c == '-' || c == '+' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        let mut parts = core.split('.');
        let mut next = |required: bool| -> Result<u64> {
            match parts.next() {
                Some(p) => p.parse().map_err(|_| invalid(s)),
                None if required => Err(invalid(s)),
                None => Ok(0),
            }
        };

        let version = CliVersion::new(next(true)?, next(true)?, next(false)?);
        if parts.next().is_some() {
            return Err(invalid(s));
        }
        Ok(version)
    }
}

fn invalid(raw: &str) -> BitwardenError {
    BitwardenError::Version {
        found: raw.trim().to_string(),
        required: MIN_SUPPORTED_VERSION.to_string(),
    }
}

impl Ord for CliVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl PartialOrd for CliVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CliVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Checks the output of `bw --version` against `required`.
///
/// Unparsable output is treated as too old.
///
/// # Example
///
/// ```
/// use bitwarden_sync::version::{check_version, CliVersion};
///
/// let floor = CliVersion::new(1, 22, 0);
/// assert!(check_version("1.21.0\n", floor).is_err());
/// assert!(check_version("1.22.0\n", floor).is_ok());
/// ```
pub fn check_version(reported: &str, required: CliVersion) -> Result<CliVersion> {
    let found = reported.parse::<CliVersion>().map_err(|_| BitwardenError::Version {
        found: reported.trim().to_string(),
        required: required.to_string(),
    })?;

    if found < required {
        return Err(BitwardenError::Version {
            found: found.to_string(),
            required: required.to_string(),
        });
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        assert_eq!("1.22.0".parse::<CliVersion>().unwrap(), CliVersion::new(1, 22, 0));
        assert_eq!("v1.22.1\n".parse::<CliVersion>().unwrap(), CliVersion::new(1, 22, 1));
        assert_eq!("1.22".parse::<CliVersion>().unwrap(), CliVersion::new(1, 22, 0));
        assert_eq!(
            "2024.1.0-beta".parse::<CliVersion>().unwrap(),
            CliVersion::new(2024, 1, 0)
        );
        assert!("".parse::<CliVersion>().is_err());
        assert!("latest".parse::<CliVersion>().is_err());
        assert!("1.2.3.4".parse::<CliVersion>().is_err());
    }

    #[test]
    fn test_version_floor() {
        assert!(matches!(
            check_version("1.21.0", MIN_SUPPORTED_VERSION),
            Err(BitwardenError::Version { .. })
        ));
        assert!(check_version("1.22.0", MIN_SUPPORTED_VERSION).is_ok());
        assert!(check_version("1.23.0", MIN_SUPPORTED_VERSION).is_ok());
        assert!(check_version("2023.12.1", MIN_SUPPORTED_VERSION).is_ok());
    }

    #[test]
    fn test_garbage_version_fails_floor() {
        let err = check_version("command not found", MIN_SUPPORTED_VERSION).unwrap_err();
        assert!(err.to_string().contains("command not found"));
    }
}
