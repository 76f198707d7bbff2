//! Configuration management
//!
//! Layers built-in defaults, an optional TOML file, and `JAIL_FTP_*`
//! environment variables. Command-line overrides are applied on top by
//! [`ServerConfig::apply_cli`].

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::cli::Cli;
use crate::transfer::TransferTimeouts;

/// Default TOML file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "config";

/// Complete server configuration, shared read-only by all sessions.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address to bind the FTP control connection
    pub bind_address: String,

    /// Port for FTP control connection (0 picks an ephemeral port)
    pub control_port: u16,

    /// Root directory every session is jailed to
    pub server_root: String,

    /// IPv4 address advertised in PASV replies instead of the control
    /// connection's local address
    #[serde(default)]
    pub passive_address: Option<Ipv4Addr>,

    /// Bound on waiting for the client to open the data connection
    pub data_accept_timeout_secs: u64,

    /// Bound on a single stalled data or control channel write
    pub transfer_timeout_secs: u64,

    /// Bound on waiting for the next control line
    pub idle_timeout_secs: u64,

    /// Maximum FTP command line length in bytes
    pub max_command_length: usize,

    /// Maximum concurrent sessions
    pub max_clients: usize,

    /// Read buffer size for file transfers
    pub buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            control_port: 2121,
            server_root: ".".to_string(),
            passive_address: None,
            data_accept_timeout_secs: 30,
            transfer_timeout_secs: 60,
            idle_timeout_secs: 300,
            max_command_length: 512,
            max_clients: 10,
            buffer_size: 8192,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `path` (required) or `config.toml` (optional),
    /// with environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("control_port", i64::from(defaults.control_port))?
            .set_default("server_root", defaults.server_root)?
            .set_default("data_accept_timeout_secs", defaults.data_accept_timeout_secs as i64)?
            .set_default("transfer_timeout_secs", defaults.transfer_timeout_secs as i64)?
            .set_default("idle_timeout_secs", defaults.idle_timeout_secs as i64)?
            .set_default("max_command_length", defaults.max_command_length as i64)?
            .set_default("max_clients", defaults.max_clients as i64)?
            .set_default("buffer_size", defaults.buffer_size as i64)?
            .add_source(file)
            .add_source(Environment::with_prefix("JAIL_FTP").try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies command-line overrides and re-validates.
    pub fn apply_cli(mut self, cli: &Cli) -> Result<Self, ConfigError> {
        if let Some(root) = &cli.root {
            self.server_root = root.to_string_lossy().into_owned();
        }
        if let Some(bind) = &cli.bind {
            self.bind_address = bind.clone();
        }
        if let Some(port) = cli.port {
            self.control_port = port;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_root.is_empty() {
            return Err(ConfigError::Message("server_root cannot be empty".into()));
        }

        if self.bind_address.is_empty() {
            return Err(ConfigError::Message("bind_address cannot be empty".into()));
        }

        if self.data_accept_timeout_secs == 0
            || self.transfer_timeout_secs == 0
            || self.idle_timeout_secs == 0
        {
            return Err(ConfigError::Message(
                "timeouts must be greater than 0".into(),
            ));
        }

        if self.max_command_length < 16 {
            return Err(ConfigError::Message(
                "max_command_length must be at least 16".into(),
            ));
        }

        if self.max_clients == 0 {
            return Err(ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and control port as socket address
    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    /// Get server root as PathBuf
    pub fn server_root_path(&self) -> PathBuf {
        PathBuf::from(&self.server_root)
    }

    pub fn transfer_timeouts(&self) -> TransferTimeouts {
        TransferTimeouts {
            accept: Duration::from_secs(self.data_accept_timeout_secs),
            write: Duration::from_secs(self.transfer_timeout_secs),
        }
    }

    /// Bound on delivering one control channel reply.
    pub fn control_write_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = ServerConfig {
            data_accept_timeout_secs: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_clients_is_rejected() {
        let config = ServerConfig {
            max_clients: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "control_port = 2999\n\
             server_root = \"/srv/ftp\"\n\
             passive_address = \"10.0.0.5\"\n\
             data_accept_timeout_secs = 5"
        )
        .unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.control_port, 2999);
        assert_eq!(config.server_root, "/srv/ftp");
        assert_eq!(config.passive_address, Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(config.transfer_timeouts().accept, Duration::from_secs(5));
        assert_eq!(config.control_write_timeout(), Duration::from_secs(60));
        assert_eq!(config.max_clients, 10);
    }

    #[test]
    fn named_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn cli_overrides_win() {
        let cli = Cli::parse_from([
            "jail-ftp-server",
            "/srv/pub",
            "--port",
            "0",
            "--bind",
            "127.0.0.1",
        ]);
        let config = ServerConfig::default().apply_cli(&cli).unwrap();
        assert_eq!(config.server_root, "/srv/pub");
        assert_eq!(config.control_socket(), "127.0.0.1:0");
    }
}
