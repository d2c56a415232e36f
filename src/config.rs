//! Client configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SESSION_FILE: &str = ".guesthouse/session.json";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Backend endpoint paths, relative to the API base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub token: String,
    pub token_refresh: String,
    pub register: String,
    pub rooms: String,
    pub bookings: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token: "/api/auth/token/".to_owned(),
            token_refresh: "/api/auth/token/refresh/".to_owned(),
            register: "/api/auth/register/".to_owned(),
            rooms: "/api/rooms/".to_owned(),
            bookings: "/api/bookings/".to_owned(),
        }
    }
}

impl Endpoints {
    /// Detail path for a single room, e.g. `/api/rooms/7/`.
    #[must_use]
    pub fn room(&self, room_id: i64) -> String {
        format!("{}/{room_id}/", self.rooms.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeouts: Timeouts,
    pub session_file: PathBuf,
    pub endpoints: Endpoints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_owned(),
            timeouts: Timeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            endpoints: Endpoints::default(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `GUESTHOUSE_API_URL`: backend base URL, default `http://localhost:8000`
    /// - `GUESTHOUSE_REQUEST_TIMEOUT_SECS`: default 30
    /// - `GUESTHOUSE_CONNECT_TIMEOUT_SECS`: default 10
    /// - `GUESTHOUSE_SESSION_FILE`: default `.guesthouse/session.json`
    ///
    /// # Errors
    ///
    /// Returns an error if a timeout variable is set but is not an integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("GUESTHOUSE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_owned());
        let timeouts = Timeouts {
            request_secs: env_parse_u64("GUESTHOUSE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: env_parse_u64("GUESTHOUSE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };
        let session_file = std::env::var("GUESTHOUSE_SESSION_FILE")
            .map_or_else(|_| PathBuf::from(DEFAULT_SESSION_FILE), PathBuf::from);

        Ok(Self {
            base_url: normalize_base_url(&base_url),
            timeouts,
            session_file,
            endpoints: Endpoints::default(),
        })
    }

    /// Replace the base URL, applying the same normalization as `from_env`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }
}

pub(crate) fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn env_parse_u64(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
