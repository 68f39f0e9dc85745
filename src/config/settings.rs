use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend: "memory" or "postgres"
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Database URL (postgres backend only)
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// SSE keep-alive comment interval in seconds of silence
    #[serde(default = "default_keep_alive_seconds")]
    pub keep_alive_seconds: u64,
    /// How long the WebSocket waits for the client's hello, in seconds
    #[serde(default = "default_handshake_timeout_seconds")]
    pub handshake_timeout_seconds: u64,
    /// Page size for backlog range queries
    #[serde(default = "default_backlog_limit")]
    pub backlog_limit: usize,
    /// Bound on each subscriber's mailbox; overflow evicts the subscriber
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_store_url() -> String {
    "postgres://localhost:5432/seqcast".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_keep_alive_seconds() -> u64 {
    15
}

fn default_handshake_timeout_seconds() -> u64 {
    5
}

fn default_backlog_limit() -> usize {
    200
}

fn default_mailbox_capacity() -> usize {
    256
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("store.backend", "memory")?
            .set_default("store.url", "postgres://localhost:5432/seqcast")?
            .set_default("store.pool_size", 10)?
            .set_default("store.connect_timeout_seconds", 5)?
            .set_default("stream.keep_alive_seconds", 15)?
            .set_default("stream.handshake_timeout_seconds", 5)?
            .set_default("stream.backlog_limit", 200)?
            .set_default("stream.mailbox_capacity", 256)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, SERVER_PORT, STORE_BACKEND, STORE_URL, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: default_store_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keep_alive_seconds: default_keep_alive_seconds(),
            handshake_timeout_seconds: default_handshake_timeout_seconds(),
            backlog_limit: default_backlog_limit(),
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}
