use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "finsync", about = "finsync - full-state sync service for the finance tracker")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "finsync.toml")]
    pub config: String,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Storage backend (overrides config file)
    #[arg(short, long, value_enum)]
    pub backend: Option<Backend>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Postgres,
    Sqlite,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,

    /// Connection string (PostgreSQL) or database path (SQLite).
    /// Takes precedence over `url_env`.
    #[serde(default)]
    pub url: Option<String>,

    /// Environment variable holding the connection string.
    #[serde(default = "default_url_env")]
    pub url_env: String,

    /// Create the tables at startup when they are missing.
    #[serde(default = "default_init_schema")]
    pub init_schema: bool,
}

impl StorageConfig {
    pub fn connection_string(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| std::env::var(&self.url_env).ok())
            .filter(|url| !url.trim().is_empty())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            backend: default_backend(),
            url: None,
            url_env: default_url_env(),
            init_schema: default_init_schema(),
        }
    }
}

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
        max_body_bytes: default_max_body_bytes(),
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    crate::api::DEFAULT_BODY_LIMIT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backend() -> Backend {
    Backend::Postgres
}

fn default_url_env() -> String {
    "DATABASE_URL".to_string()
}

fn default_init_schema() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: default_server(),
            logging: default_logging(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(backend) = cli.backend {
            config.storage.backend = backend;
        }

        config
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
