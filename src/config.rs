//! Configuration module for the linewire server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Connection handler variant served on every accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    /// Binary-transparent echo until the peer half-closes.
    #[default]
    Echo,
    /// Newline-delimited JSON primality requests.
    Prime,
}

/// Command-line arguments for the server
#[derive(Parser, Debug, Default)]
#[command(name = "linewire")]
#[command(version)]
#[command(about = "A concurrent echo and line-protocol TCP server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:4040)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Protocol served on each connection
    #[arg(short = 'p', long, value_enum)]
    pub protocol: Option<ProtocolType>,

    /// Number of runtime worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Per-connection read buffer size in bytes
    #[arg(short = 'b', long)]
    pub buffer_size: Option<usize>,

    /// Longest accepted request line in bytes, excluding the newline
    #[arg(long)]
    pub max_line_length: Option<usize>,

    /// Seconds to wait for input before closing a connection (0 = never)
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Protocol served on each connection
    #[serde(default)]
    pub protocol: ProtocolType,
    /// Number of worker threads
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            protocol: ProtocolType::default(),
            workers: None,
        }
    }
}

/// Per-connection configuration
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Idle timeout in seconds, 0 disables it
    #[serde(default)]
    pub idle_timeout: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            max_line_length: default_max_line_length(),
            idle_timeout: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:4040".to_string()
}

fn default_buffer_size() -> usize {
    8 * 1024
}

fn default_max_line_length() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Limits applied to every connection a handler owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    /// Size of the reused read buffer.
    pub buffer_size: usize,
    /// Longest frame the framed handler accepts, excluding the delimiter.
    pub max_line_length: usize,
    /// Maximum time a single read may wait, if any.
    pub idle_timeout: Option<Duration>,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            max_line_length: default_max_line_length(),
            idle_timeout: None,
        }
    }
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub protocol: ProtocolType,
    pub workers: usize,
    pub buffer_size: usize,
    pub max_line_length: usize,
    pub idle_timeout: u64,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::from_parts(cli, toml_config)
    }

    /// Merge parsed CLI args over a parsed config file and validate the result.
    pub fn from_parts(cli: CliArgs, file: TomlConfig) -> Result<Self, ConfigError> {
        let listen_str = cli.listen.unwrap_or(file.server.listen);
        let listen = listen_str
            .parse()
            .map_err(|_| ConfigError::InvalidListen(listen_str.clone()))?;

        let buffer_size = cli.buffer_size.unwrap_or(file.connection.buffer_size);
        if buffer_size == 0 {
            return Err(ConfigError::ZeroValue("buffer_size"));
        }

        let max_line_length = cli
            .max_line_length
            .unwrap_or(file.connection.max_line_length);
        if max_line_length == 0 {
            return Err(ConfigError::ZeroValue("max_line_length"));
        }

        let workers = match cli.workers.or(file.server.workers) {
            Some(0) | None => num_cpus(),
            Some(n) => n,
        };

        Ok(Config {
            listen,
            protocol: cli.protocol.unwrap_or(file.server.protocol),
            workers,
            buffer_size,
            max_line_length,
            idle_timeout: cli.idle_timeout.unwrap_or(file.connection.idle_timeout),
            log_level: cli.log_level.unwrap_or(file.logging.level),
        })
    }

    /// Per-connection limits derived from this configuration.
    pub fn connection_limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            buffer_size: self.buffer_size,
            max_line_length: self.max_line_length,
            idle_timeout: (self.idle_timeout > 0).then(|| Duration::from_secs(self.idle_timeout)),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("Invalid listen address '{0}'")]
    InvalidListen(String),
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.listen, "0.0.0.0:4040");
        assert_eq!(config.server.protocol, ProtocolType::Echo);
        assert_eq!(config.connection.buffer_size, 8 * 1024);
        assert_eq!(config.connection.idle_timeout, 0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "127.0.0.1:5050"
            protocol = "prime"
            workers = 4

            [connection]
            buffer_size = 1024
            max_line_length = 4096
            idle_timeout = 30

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:5050");
        assert_eq!(config.server.protocol, ProtocolType::Prime);
        assert_eq!(config.server.workers, Some(4));
        assert_eq!(config.connection.buffer_size, 1024);
        assert_eq!(config.connection.max_line_length, 4096);
        assert_eq!(config.connection.idle_timeout, 30);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: TomlConfig = toml::from_str(
            r#"
            [server]
            listen = "127.0.0.1:5050"
            protocol = "echo"

            [logging]
            level = "warn"
        "#,
        )
        .unwrap();

        let cli = CliArgs {
            listen: Some("127.0.0.1:6060".to_string()),
            protocol: Some(ProtocolType::Prime),
            workers: Some(2),
            ..Default::default()
        };

        let config = Config::from_parts(cli, file).unwrap();
        assert_eq!(config.listen, "127.0.0.1:6060".parse::<SocketAddr>().unwrap());
        assert_eq!(config.protocol, ProtocolType::Prime);
        assert_eq!(config.workers, 2);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_invalid_listen_rejected() {
        let cli = CliArgs {
            listen: Some("not-an-address".to_string()),
            ..Default::default()
        };

        match Config::from_parts(cli, TomlConfig::default()) {
            Err(ConfigError::InvalidListen(addr)) => assert_eq!(addr, "not-an-address"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let cli = CliArgs {
            buffer_size: Some(0),
            ..Default::default()
        };

        assert!(matches!(
            Config::from_parts(cli, TomlConfig::default()),
            Err(ConfigError::ZeroValue("buffer_size"))
        ));
    }

    #[test]
    fn test_connection_limits() {
        let mut config = Config::from_parts(CliArgs::default(), TomlConfig::default()).unwrap();
        assert_eq!(config.connection_limits().idle_timeout, None);
        assert!(config.workers >= 1);

        config.idle_timeout = 5;
        let limits = config.connection_limits();
        assert_eq!(limits.idle_timeout, Some(Duration::from_secs(5)));
        assert_eq!(limits.buffer_size, 8 * 1024);
        assert_eq!(limits.max_line_length, 1024 * 1024);
    }
}
