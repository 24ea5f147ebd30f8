//! Client configuration.

use std::time::Duration;

use secrecy::SecretString;

use crate::version::{CliVersion, MIN_SUPPORTED_VERSION};
use crate::{BitwardenError, Result};

/// Environment variable holding the master password.
pub const PASSWORD_ENV: &str = "BW_PASSWORD";

/// Environment variable selecting the `bw serve` port.
pub const SERVE_PORT_ENV: &str = "BW_SERVE_PORT";

/// Environment variable overriding the `bw` executable.
pub const PROGRAM_ENV: &str = "BW_CLI";

/// How the client reaches the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// One `bw` subprocess per operation, session passed with `--session`.
    Subcommand,
    /// A single long-lived `bw serve` reached over loopback HTTP.
    /// `None` picks a free port.
    Serve {
        /// Fixed port, if any
        port: Option<u16>,
    },
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subcommand => write!(f, "subcommand"),
            Self::Serve { port: Some(port) } => write!(f, "serve:{}", port),
            Self::Serve { port: None } => write!(f, "serve"),
        }
    }
}

/// Configuration for connecting to a vault.
///
/// ```no_run
/// use bitwarden_sync::{Config, TransportKind};
/// use std::time::Duration;
///
/// let config = Config::new("correct horse battery staple")
///     .with_transport(TransportKind::Serve { port: None })
///     .with_max_request_delay(Duration::ZERO);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Executable to run (default: `bw`)
    pub program: String,

    /// Master password used to unlock the vault
    pub password: SecretString,

    /// Transport strategy (default: subcommand)
    pub transport: TransportKind,

    /// Upper bound of the random pause before each subcommand (default: 5s)
    pub max_request_delay: Duration,

    /// Health check attempts while `bw serve` starts (default: 10)
    pub health_check_attempts: u32,

    /// Pause between health check attempts (default: 1s)
    pub health_check_interval: Duration,

    /// Oldest accepted `bw` version
    pub min_version: CliVersion,
}

impl Config {
    /// Creates a configuration for the given master password.
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            program: "bw".to_string(),
            password: SecretString::from(password.into()),
            transport: TransportKind::Subcommand,
            max_request_delay: Duration::from_secs(5),
            health_check_attempts: 10,
            health_check_interval: Duration::from_secs(1),
            min_version: MIN_SUPPORTED_VERSION,
        }
    }

    /// Builds a configuration from `BW_PASSWORD`, `BW_SERVE_PORT` and `BW_CLI`.
    pub fn from_env() -> Result<Self> {
        let settings = ProviderConfig::resolve(None, None)?;
        let mut config = settings.into_config();
        if let Ok(program) = std::env::var(PROGRAM_ENV) {
            if !program.is_empty() {
                config.program = program;
            }
        }
        Ok(config)
    }

    /// Sets the `bw` executable (name on `PATH` or absolute path).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Sets the transport.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the upper bound of the random pause before each subcommand.
    /// `Duration::ZERO` disables it.
    pub fn with_max_request_delay(mut self, delay: Duration) -> Self {
        self.max_request_delay = delay;
        self
    }

    /// Sets the `bw serve` startup budget.
    pub fn with_health_check(mut self, attempts: u32, interval: Duration) -> Self {
        self.health_check_attempts = attempts;
        self.health_check_interval = interval;
        self
    }

    /// Sets the minimum accepted `bw` version.
    pub fn with_min_version(mut self, version: CliVersion) -> Self {
        self.min_version = version;
        self
    }
}

/// Provider-level settings as a host hands them over.
///
/// Unset values fall back to the environment; the password must end up
/// non-empty.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Master password
    pub password: SecretString,
    /// `bw serve` port; `None` or `0` selects the subcommand transport
    pub serve_port: Option<u16>,
}

impl ProviderConfig {
    /// Resolves explicit values against `BW_PASSWORD` and `BW_SERVE_PORT`.
    ///
    /// # Errors
    ///
    /// Returns [`BitwardenError::Config`] if no password is available or the
    /// port variable is not a valid port number.
    pub fn resolve(password: Option<String>, serve_port: Option<u16>) -> Result<Self> {
        let password = password
            .or_else(|| std::env::var(PASSWORD_ENV).ok())
            .unwrap_or_default();
        if password.is_empty() {
            return Err(BitwardenError::Config(format!(
                "password cannot be an empty string (set it explicitly or via {})",
                PASSWORD_ENV
            )));
        }

        let serve_port = match serve_port {
            Some(port) => Some(port),
            None => match std::env::var(SERVE_PORT_ENV) {
                Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse().map_err(|e| {
                    BitwardenError::Config(format!("could not parse {}={:?}: {}", SERVE_PORT_ENV, raw, e))
                })?),
                _ => None,
            },
        };

        Ok(Self {
            password: SecretString::from(password),
            serve_port,
        })
    }

    /// Selects the transport implied by the port.
    pub fn transport(&self) -> TransportKind {
        match self.serve_port {
            Some(port) if port != 0 => TransportKind::Serve { port: Some(port) },
            _ => TransportKind::Subcommand,
        }
    }

    /// Converts into a client [`Config`] with default tuning.
    pub fn into_config(self) -> Config {
        let transport = self.transport();
        Config {
            password: self.password,
            transport,
            ..Config::new(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_config_builder() {
        let config = Config::new("pw")
            .with_program("/opt/bw")
            .with_transport(TransportKind::Serve { port: Some(8087) })
            .with_max_request_delay(Duration::ZERO)
            .with_health_check(3, Duration::from_millis(50));

        assert_eq!(config.program, "/opt/bw");
        assert_eq!(config.password.expose_secret(), "pw");
        assert_eq!(config.transport, TransportKind::Serve { port: Some(8087) });
        assert_eq!(config.max_request_delay, Duration::ZERO);
        assert_eq!(config.health_check_attempts, 3);
    }

    #[test]
    fn test_default_config() {
        let config = Config::new("pw");
        assert_eq!(config.program, "bw");
        assert_eq!(config.transport, TransportKind::Subcommand);
        assert_eq!(config.max_request_delay, Duration::from_secs(5));
        assert_eq!(config.health_check_attempts, 10);
        assert_eq!(config.health_check_interval, Duration::from_secs(1));
        assert_eq!(config.min_version, CliVersion::new(1, 22, 0));
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(TransportKind::Subcommand.to_string(), "subcommand");
        assert_eq!(TransportKind::Serve { port: Some(1) }.to_string(), "serve:1");
    }

    #[test]
    fn test_provider_config_explicit_values() {
        let settings = ProviderConfig::resolve(Some("pw".into()), Some(8087)).unwrap();
        assert_eq!(settings.transport(), TransportKind::Serve { port: Some(8087) });

        let settings = ProviderConfig::resolve(Some("pw".into()), Some(0)).unwrap();
        assert_eq!(settings.transport(), TransportKind::Subcommand);

        let config = settings.into_config();
        assert_eq!(config.password.expose_secret(), "pw");
        assert_eq!(config.program, "bw");
    }

    #[test]
    fn test_provider_config_rejects_empty_password() {
        let err = ProviderConfig::resolve(Some(String::new()), None).unwrap_err();
        assert!(matches!(err, BitwardenError::Config(_)));
    }
}
