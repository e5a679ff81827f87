use std::net::SocketAddr;
use std::time::Duration;

use secrecy::SecretString;
use tracing::Level;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// HS256 secret used to validate bearer tokens minted by the auth
    /// service; this process never issues tokens itself.
    pub secret_key: SecretString,
    /// Whether `create_if_missing` connections may run without a durable
    /// call record.
    pub allow_transient_sessions: bool,
    pub receive_timeout: Duration,
    pub send_timeout: Duration,
    pub send_queue_capacity: usize,
    pub transcript_max_length: usize,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// A `.env` file in the current directory is honored. Variables:
    ///
    /// *   `BIND_ADDRESS`: Address and port to bind (default "0.0.0.0:3000").
    /// *   `CALLGUARD_SECRET_KEY`: HS256 secret for bearer validation. Required.
    /// *   `ALLOW_TRANSIENT_SESSIONS`: Permit non-persisted sessions (default "true").
    /// *   `RECEIVE_TIMEOUT_SECS`: Inactivity timeout per connection (default 15).
    /// *   `SEND_TIMEOUT_SECS`: Per-message write timeout (default 2).
    /// *   `SEND_QUEUE_CAPACITY`: Outbound queue slots per session (default 10).
    /// *   `TRANSCRIPT_MAX_LENGTH`: Maximum transcript characters (default 5000).
    /// *   `RUST_LOG`: Logging level (default "INFO").
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let secret_key = std::env::var("CALLGUARD_SECRET_KEY")
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingVar("CALLGUARD_SECRET_KEY".to_string()))?;

        let allow_transient_sessions = parse_var("ALLOW_TRANSIENT_SESSIONS", true)?;
        let receive_timeout = Duration::from_secs(parse_var("RECEIVE_TIMEOUT_SECS", 15u64)?);
        let send_timeout = Duration::from_secs(parse_var("SEND_TIMEOUT_SECS", 2u64)?);
        let send_queue_capacity = parse_var("SEND_QUEUE_CAPACITY", 10usize)?;
        let transcript_max_length = parse_var("TRANSCRIPT_MAX_LENGTH", 5000usize)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            secret_key,
            allow_transient_sessions,
            receive_timeout,
            send_timeout,
            send_queue_capacity,
            transcript_max_length,
            log_level,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
