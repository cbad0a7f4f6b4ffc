//! Configuration management

use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub resilience: ResilienceConfig,
    pub feed: FeedConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Global request timeout in seconds applied at the HTTP layer.
    pub request_timeout_seconds: u64,
    /// Allowed CORS origins. Use ["*"] to allow any (development only). Empty vector -> no external origins.
    pub allowed_origins: Vec<String>,
    /// Largest accepted report upload in bytes
    pub max_body_bytes: usize,
}

/// Which store implementation backs the dependency table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    /// Process-local rows, lost on restart
    Memory,
}

/// Dependency store and pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub pool_size: usize,
    pub max_overflow: usize,
    pub acquire_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

/// Circuit breaker and retry configuration for the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    pub fail_threshold: u32,
    pub reset_timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// 1.0 keeps the delay fixed
    pub backoff_multiplier: f64,
}

/// Vulnerability reference feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    pub timeout_seconds: u64,
    /// Rebuild the index periodically; `None` keeps the startup snapshot
    pub refresh_interval_hours: Option<u64>,
}

/// Session validator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub enabled: bool,
    pub validator_url: String,
    pub timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                request_timeout_seconds: 60,
                allowed_origins: vec!["*".to_string()],
                max_body_bytes: 64 * 1024 * 1024,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                host: "localhost".to_string(),
                port: 5432,
                name: "postgres".to_string(),
                user: "postgres".to_string(),
                password: "postgres".to_string(),
                pool_size: 5,
                max_overflow: 10,
                acquire_timeout_seconds: 30,
                connect_timeout_seconds: 5,
            },
            resilience: ResilienceConfig {
                fail_threshold: 1,
                reset_timeout_seconds: 10,
                max_retries: 3,
                retry_delay_ms: 200,
                backoff_multiplier: 1.0,
            },
            feed: FeedConfig {
                url: "https://raw.githubusercontent.com/pyupio/safety-db/master/data/insecure_full.json"
                    .to_string(),
                timeout_seconds: 60,
                refresh_interval_hours: None,
            },
            auth: AuthConfig {
                enabled: true,
                validator_url: "http://localhost:8080/msapi/validateuser".to_string(),
                timeout_seconds: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

/// Legacy database variables still honoured on top of the layered config
const LEGACY_DATABASE_ENV: [(&str, &str); 5] = [
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_NAME", "database.name"),
    ("DB_USER", "database.user"),
    ("DB_PASS", "database.password"),
];

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = config::Config::try_from(&Config::default())?;

        let mut builder = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        // Override with environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DEPPKG")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("server.allowed_origins"),
        );

        for (variable, key) in LEGACY_DATABASE_ENV {
            builder = builder.set_override_option(key, std::env::var(variable).ok())?;
        }

        builder.build()?.try_deserialize()
    }
}
