//! Relay configuration parsed from environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_MAX_SNAPSHOT_BYTES: usize = 2 * 1024 * 1024;
pub const DEFAULT_CHAT_HISTORY_LIMIT: usize = 200;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not valid: {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Outbound frames buffered per socket before broadcasts to it are dropped.
    pub client_channel_capacity: usize,
    pub max_snapshot_bytes: usize,
    /// Chat messages kept per room.
    pub chat_history_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
            max_snapshot_bytes: DEFAULT_MAX_SNAPSHOT_BYTES,
            chat_history_limit: DEFAULT_CHAT_HISTORY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Build config from the process environment.
    ///
    /// Optional:
    /// - `BIND_ADDR`: default `0.0.0.0`
    /// - `PORT`: default 3000
    /// - `CLIENT_CHANNEL_CAPACITY`: default 256
    /// - `MAX_SNAPSHOT_BYTES`: default 2 MiB
    /// - `CHAT_HISTORY_LIMIT`: default 200
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is set but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] over an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is set but does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: parse_var(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            port: parse_var(&lookup, "PORT", defaults.port)?,
            client_channel_capacity: non_zero(
                "CLIENT_CHANNEL_CAPACITY",
                parse_var(&lookup, "CLIENT_CHANNEL_CAPACITY", defaults.client_channel_capacity)?,
            )?,
            max_snapshot_bytes: non_zero(
                "MAX_SNAPSHOT_BYTES",
                parse_var(&lookup, "MAX_SNAPSHOT_BYTES", defaults.max_snapshot_bytes)?,
            )?,
            chat_history_limit: parse_var(&lookup, "CHAT_HISTORY_LIMIT", defaults.chat_history_limit)?,
        })
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

fn non_zero(var: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero { var });
    }
    Ok(value)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
