//! Unlocked vault sessions.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

/// An unlocked session.
///
/// For the subcommand transport this holds the token printed by
/// `bw unlock --raw`, passed to every later call with `--session`. A
/// `bw serve` process keeps its session internally, so its sessions carry no
/// token.
///
/// Sessions are never refreshed: a vault lock or timeout invalidates the
/// token and the next call fails.
pub struct Session {
    token: Option<SecretString>,
    unlocked_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session from an unlock token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(SecretString::from(token.into())),
            unlocked_at: Utc::now(),
        }
    }

    /// Creates a session held by a `bw serve` process.
    pub fn implicit() -> Self {
        Self {
            token: None,
            unlocked_at: Utc::now(),
        }
    }

    /// Returns the session token, if this session has one.
    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.expose_secret())
    }

    /// When the vault was unlocked.
    pub fn unlocked_at(&self) -> DateTime<Utc> {
        self.unlocked_at
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("unlocked_at", &self.unlocked_at)
            .finish()
    }
}
