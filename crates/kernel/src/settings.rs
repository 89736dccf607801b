use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "development";
const ENV_VAR_NAME: &str = "SHELF_ENV";
const CONFIG_DIR_ENV: &str = "SHELF_CONFIG_DIR";
const ENV_PREFIX: &str = "SHELF";

/// Legacy variable names still honoured for the listening port and store URI.
const PORT_ENV: &str = "PORT";
const MONGO_URI_ENV: &str = "MONGO_URI";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        match name {
            "development" | "local" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected development/staging/production",
                other
            )),
        }
    }

    /// Development builds expose internal error details in responses.
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// `SHELF_*` variables and finally the legacy `PORT` / `MONGO_URI`.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from an explicit config directory and environment name.
    pub fn load_from(config_dir: &Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment = Environment::parse(environment)?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let port = match std::env::var(PORT_ENV) {
            Ok(raw) => Some(
                raw.parse::<u16>()
                    .with_context(|| format!("{PORT_ENV} must be a port number, got '{raw}'"))?,
            ),
            Err(_) => None,
        };

        let cfg = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", port.map(i64::from))
            .context("invalid PORT override")?
            .set_override_option("database.uri", std::env::var(MONGO_URI_ENV).ok())
            .context("invalid MONGO_URI override")?
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // The selected environment wins over anything written in the files.
        settings.environment = parsed_environment;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Prefix in front of every module mount point, e.g. `/api`.
    #[serde(default)]
    pub api_prefix: String,
    #[serde(default = "ServerSettings::default_static_dir")]
    pub static_dir: Option<String>,
    #[serde(default = "ServerSettings::default_docs_path")]
    pub docs_path: String,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        3000
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }

    fn default_static_dir() -> Option<String> {
        Some("public".to_string())
    }

    fn default_docs_path() -> String {
        "/apidocs".to_string()
    }

    /// Mount point of a module, honouring the configured prefix.
    pub fn module_path(&self, module_name: &str) -> String {
        format!("{}/{}", self.api_prefix.trim_end_matches('/'), module_name)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            api_prefix: String::new(),
            static_dir: Self::default_static_dir(),
            docs_path: Self::default_docs_path(),
            rate_limit: RateLimitSettings::default(),
        }
    }
}

/// Per-client request budget over a sliding window.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "RateLimitSettings::default_enabled")]
    pub enabled: bool,
    #[serde(default = "RateLimitSettings::default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "RateLimitSettings::default_max_requests")]
    pub max_requests: u32,
}

impl RateLimitSettings {
    fn default_enabled() -> bool {
        true
    }

    fn default_window_secs() -> u64 {
        15 * 60
    }

    fn default_max_requests() -> u32 {
        100
    }

    /// Time needed to earn back a single request, in milliseconds.
    pub fn replenish_interval_ms(&self) -> u64 {
        let max = u64::from(self.max_requests.max(1));
        (self.window_secs * 1000 / max).max(1)
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            window_secs: Self::default_window_secs(),
            max_requests: Self::default_max_requests(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Mongodb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "DatabaseSettings::default_uri")]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_database")]
    pub database: String,
    #[serde(default = "DatabaseSettings::default_collection")]
    pub collection: String,
    #[serde(default = "DatabaseSettings::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "DatabaseSettings::default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

impl DatabaseSettings {
    fn default_uri() -> String {
        "mongodb://127.0.0.1:27017".to_string()
    }

    fn default_database() -> String {
        "library".to_string()
    }

    fn default_collection() -> String {
        "books".to_string()
    }

    fn default_connect_timeout_ms() -> u64 {
        5000
    }

    fn default_operation_timeout_ms() -> u64 {
        5000
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            uri: Self::default_uri(),
            database: Self::default_database(),
            collection: Self::default_collection(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            operation_timeout_ms: Self::default_operation_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "TelemetrySettings::default_level")]
    pub level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl TelemetrySettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("shelf-settings-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_environment_is_development() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Development);
        assert!(settings.environment.is_development());
    }

    #[test]
    fn default_port_is_3000() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn default_database_uri_is_localhost() {
        let settings = Settings::default();
        assert_eq!(settings.database.uri, "mongodb://127.0.0.1:27017");
        assert_eq!(settings.database.backend, StoreBackend::Mongodb);
    }

    #[test]
    fn local_is_an_alias_for_development() {
        assert_eq!(Environment::parse("local").unwrap(), Environment::Development);
        assert!(Environment::parse("qa").is_err());
    }

    #[test]
    fn module_path_honours_prefix() {
        let mut server = ServerSettings::default();
        assert_eq!(server.module_path("books"), "/books");

        server.api_prefix = "/api/".to_string();
        assert_eq!(server.module_path("books"), "/api/books");
    }

    #[test]
    fn default_rate_limit_allows_100_requests_per_15_minutes() {
        let limit = RateLimitSettings::default();
        assert_eq!(limit.max_requests, 100);
        assert_eq!(limit.replenish_interval_ms(), 9000);
    }

    #[test]
    fn environment_file_overrides_base_file() {
        let dir = scratch_dir("layering");
        std::fs::write(
            dir.join("base.toml"),
            "[database]\nbackend = \"memory\"\ncollection = \"catalog\"\n",
        )
        .unwrap();
        std::fs::write(dir.join("production.toml"), "[telemetry]\nlog_format = \"json\"\n").unwrap();

        let settings = Settings::load_from(&dir, "production").unwrap();
        assert_eq!(settings.environment, Environment::Production);
        assert_eq!(settings.database.backend, StoreBackend::Memory);
        assert_eq!(settings.database.collection, "catalog");
        assert_eq!(settings.telemetry.log_format, LogFormat::Json);
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let dir = scratch_dir("unknown-env");
        assert!(Settings::load_from(&dir, "qa").is_err());
    }
}
