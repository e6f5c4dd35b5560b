//! Configuration management

use clap::Parser;
use config::{
    builder::DefaultState, Config as ConfigBuilder, ConfigBuilder as Builder,
    ConfigError as BuilderError, Environment, File,
};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Secret shipped in the defaults; rejected in production
pub const DEFAULT_JWT_SECRET: &str = "change-this-secret-in-production";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid server configuration: {0}")]
    InvalidServer(String),

    #[error("Invalid database configuration: {0}")]
    InvalidDatabase(String),

    #[error("Invalid logging configuration: {0}")]
    InvalidLogging(String),

    #[error("Invalid security configuration: {0}")]
    InvalidSecurity(String),

    #[error("Invalid shield configuration: {0}")]
    InvalidShield(String),

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl From<BuilderError> for ConfigError {
    fn from(err: BuilderError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// Deployment environment name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Development,
    Production,
    Test,
}

impl AppEnvironment {
    pub fn is_production(self) -> bool {
        self == AppEnvironment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
            AppEnvironment::Test => "test",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub shield: ShieldConfig,
}

impl Config {
    /// Load configuration with precedence: CLI args > Environment variables > Config file > Defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(&CliArgs::parse())
    }

    /// Build configuration from already-parsed command-line arguments
    pub fn from_args(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        // 1. Defaults
        let mut builder = Self::defaults()?;

        // 2. Config file
        if let Some(config_path) = &cli_args.config {
            if !config_path.exists() {
                return Err(ConfigError::FileNotFound(config_path.display().to_string()));
            }
            builder = builder.add_source(File::from(config_path.as_path()));
        }

        // 3. Environment variables, e.g. WARDEN_SERVER__PORT=8080
        builder = builder.add_source(
            Environment::with_prefix("WARDEN")
                .separator("__")
                .try_parsing(true),
        );
        builder = Self::apply_conventional_env(builder)?;

        // 4. CLI arguments
        if let Some(host) = &cli_args.host {
            builder = builder.set_override("server.host", host.clone())?;
        }
        if let Some(port) = cli_args.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(database_url) = &cli_args.database_url {
            builder = builder.set_override("database.url", database_url.clone())?;
        }
        if let Some(environment) = &cli_args.environment {
            builder = builder.set_override("environment", environment.clone())?;
        }
        if let Some(log_level) = &cli_args.log_level {
            builder = builder.set_override("logging.level", log_level.clone())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Defaults-only configuration for the given environment
    pub fn for_environment(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let config: Config = Self::defaults()?
            .set_override("environment", environment.as_str())?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<Builder<DefaultState>, ConfigError> {
        Ok(ConfigBuilder::builder()
            .set_default("environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.request_timeout", 30)?
            .set_default("database.url", "sqlite://./data/warden.db")?
            .set_default("database.connection_pool_size", 10)?
            .set_default("database.busy_timeout", 5000)?
            .set_default("logging.format", "json")?
            .set_default("logging.output", "stdout")?
            .set_default("security.jwt_secret", DEFAULT_JWT_SECRET)?
            .set_default("security.token_ttl", 86400)? // 1 day
            .set_default("security.cookie_max_age", 900)? // 15 minutes
            .set_default("security.bcrypt_cost", 10)?
            .set_default("security.allowed_origins", vec!["*"])?
            .set_default("security.hsts_max_age", 31536000)?
            .set_default("shield.mode", "live")?
            .set_default("shield.window_seconds", 60)?
            .set_default("shield.guest_limit", 5)?
            .set_default("shield.user_limit", 10)?
            .set_default("shield.admin_limit", 20)?
            .set_default("shield.block_missing_user_agent", true)?
            .set_default(
                "shield.allowed_bots",
                vec!["googlebot", "bingbot", "duckduckbot"],
            )?
            .set_default("shield.trust_forwarded_headers", false)?)
    }

    /// Unprefixed variables conventionally set by deploy tooling
    fn apply_conventional_env(
        mut builder: Builder<DefaultState>,
    ) -> Result<Builder<DefaultState>, ConfigError> {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", url)?;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            builder = builder.set_override("security.jwt_secret", secret)?;
        }
        if let Ok(environment) = std::env::var("APP_ENV") {
            builder = builder.set_override("environment", environment.to_lowercase())?;
        }
        Ok(builder)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.security.validate(self.environment)?;
        self.shield.validate()?;
        Ok(())
    }
}

/// Command-line arguments for configuration override
#[derive(Debug, Parser)]
#[command(name = "warden")]
#[command(about = "Warden account service", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Server host address
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Database URL (sqlite://path, plain path, or :memory:)
    #[arg(short, long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Environment name (development, production, test)
    #[arg(short, long, value_name = "ENV")]
    pub environment: Option<String>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: u64, // seconds
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::InvalidServer("host cannot be empty".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidServer("port must be greater than 0".to_string()));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidServer(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub connection_pool_size: usize,
    pub busy_timeout: u64, // milliseconds
}

/// Where the SQLite database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseConfig {
    /// Resolve the configured URL into a database location
    pub fn location(&self) -> DatabaseLocation {
        let raw = self.url.strip_prefix("sqlite://").unwrap_or(&self.url);
        match raw {
            ":memory:" => DatabaseLocation::Memory,
            path => DatabaseLocation::File(PathBuf::from(path)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let raw = self.url.strip_prefix("sqlite://").unwrap_or(&self.url);
        if raw.is_empty() {
            return Err(ConfigError::InvalidDatabase("url cannot be empty".to_string()));
        }

        if self.connection_pool_size == 0 {
            return Err(ConfigError::InvalidDatabase(
                "connection_pool_size must be greater than 0".to_string(),
            ));
        }

        if self.busy_timeout == 0 {
            return Err(ConfigError::InvalidDatabase(
                "busy_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Explicit level; falls back to the environment's default when unset
    pub level: Option<String>,
    pub format: String,
    pub output: String,
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Level to run with in the given environment
    pub fn effective_level(&self, environment: AppEnvironment) -> &str {
        match (&self.level, environment) {
            (Some(level), _) => level,
            (None, AppEnvironment::Development) => "debug",
            (None, _) => "info",
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["debug", "info", "warn", "error"];
        if let Some(level) = &self.level {
            if !valid_levels.contains(&level.as_str()) {
                return Err(ConfigError::InvalidLogging(format!(
                    "level must be one of: {:?}",
                    valid_levels
                )));
            }
        }

        let valid_formats = ["json", "text"];
        if !valid_formats.contains(&self.format.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "format must be one of: {:?}",
                valid_formats
            )));
        }

        let valid_outputs = ["stdout", "file"];
        if !valid_outputs.contains(&self.output.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "output must be one of: {:?}",
                valid_outputs
            )));
        }

        if self.output == "file" && self.log_file.is_none() {
            return Err(ConfigError::InvalidLogging(
                "log_file must be specified when output is 'file'".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub token_ttl: u64,      // seconds
    pub cookie_max_age: u64, // seconds
    pub bcrypt_cost: u32,
    pub allowed_origins: Vec<String>,
    pub hsts_max_age: u64, // seconds
}

impl SecurityConfig {
    pub fn validate(&self, environment: AppEnvironment) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::InvalidSecurity("jwt_secret cannot be empty".to_string()));
        }

        if environment.is_production()
            && (self.jwt_secret == DEFAULT_JWT_SECRET || self.jwt_secret.len() < 32)
        {
            return Err(ConfigError::InvalidSecurity(
                "jwt_secret must be set to at least 32 bytes in production".to_string(),
            ));
        }

        if self.token_ttl == 0 {
            return Err(ConfigError::InvalidSecurity("token_ttl must be greater than 0".to_string()));
        }

        if self.cookie_max_age == 0 {
            return Err(ConfigError::InvalidSecurity(
                "cookie_max_age must be greater than 0".to_string(),
            ));
        }

        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::InvalidSecurity(
                "bcrypt_cost must be between 4 and 31".to_string(),
            ));
        }

        if self.allowed_origins.is_empty() {
            return Err(ConfigError::InvalidSecurity("allowed_origins cannot be empty".to_string()));
        }

        if environment.is_production() && self.hsts_max_age == 0 {
            return Err(ConfigError::InvalidSecurity(
                "hsts_max_age must be greater than 0 in production".to_string(),
            ));
        }

        Ok(())
    }
}

/// Whether the security gate enforces its decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShieldMode {
    Live,
    DryRun,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShieldConfig {
    pub mode: ShieldMode,
    pub window_seconds: u64,
    pub guest_limit: usize,
    pub user_limit: usize,
    pub admin_limit: usize,
    pub block_missing_user_agent: bool,
    pub allowed_bots: Vec<String>,
    pub trust_forwarded_headers: bool,
}

impl ShieldConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_seconds == 0 {
            return Err(ConfigError::InvalidShield(
                "window_seconds must be greater than 0".to_string(),
            ));
        }

        if self.guest_limit == 0 || self.user_limit == 0 || self.admin_limit == 0 {
            return Err(ConfigError::InvalidShield(
                "per-role limits must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
