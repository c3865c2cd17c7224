//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: 8080,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Governance store connection; `None` runs the in-memory store
    pub url: Option<String>,
    /// Catalog connection, defaults to `url`
    pub catalog_url: Option<String>,
    pub max_pool_size: usize,
    /// Schema holding the description_governance table
    pub governance_schema: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            catalog_url: None,
            max_pool_size: 10,
            governance_schema: "governance".to_string(),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

/// Description model endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub endpoint: String,
    pub model_name: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model_name: "gpt-4o-mini".to_string(),
            api_key: None,
            max_tokens: 200,
            temperature: 0.3,
            timeout_secs: 30,
        }
    }
}

/// Generation run tuning
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    pub batch_size: usize,
    pub delay_ms: u64,
    pub sample_items: usize,
    pub sample_rows: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            delay_ms: 500,
            sample_items: 10,
            sample_rows: 5,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub model: ModelConfig,
    pub generation: GenerationConfig,
    /// Principal used when a request carries no identity header
    pub default_principal: String,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let server = ServerConfig {
            host: env_parse("HOST")?.unwrap_or_else(|| ServerConfig::default().host),
            port: env_parse("PORT")?.unwrap_or_else(|| ServerConfig::default().port),
        };

        let url = env_string("DATABASE_URL");
        if let Some(url) = &url {
            Self::validate_database_url(url)?;
        }
        let catalog_url = env_string("CATALOG_DATABASE_URL");
        if let Some(catalog_url) = &catalog_url {
            Self::validate_database_url(catalog_url)?;
        }

        let database = DatabaseConfig {
            url,
            catalog_url,
            max_pool_size: env_parse("DB_MAX_CONNECTIONS")?.unwrap_or(10),
            governance_schema: env_string("GOVERNANCE_SCHEMA")
                .unwrap_or_else(|| DatabaseConfig::default().governance_schema),
        };

        let cors = CorsConfig {
            allowed_origins: env_string("ALLOWED_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let model_defaults = ModelConfig::default();
        let model = ModelConfig {
            endpoint: env_string("MODEL_ENDPOINT").unwrap_or(model_defaults.endpoint),
            model_name: env_string("MODEL_NAME").unwrap_or(model_defaults.model_name),
            api_key: env_string("MODEL_API_KEY"),
            max_tokens: env_parse("MODEL_MAX_TOKENS")?.unwrap_or(model_defaults.max_tokens),
            temperature: env_parse("MODEL_TEMPERATURE")?.unwrap_or(model_defaults.temperature),
            timeout_secs: env_parse("MODEL_TIMEOUT_SECS")?.unwrap_or(model_defaults.timeout_secs),
        };
        url::Url::parse(&model.endpoint).map_err(|e| {
            ConfigError::InvalidValue(format!("MODEL_ENDPOINT is not a valid URL: {}", e))
        })?;

        let generation_defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            batch_size: env_parse("GENERATION_BATCH_SIZE")?
                .unwrap_or(generation_defaults.batch_size),
            delay_ms: env_parse("GENERATION_DELAY_MS")?.unwrap_or(generation_defaults.delay_ms),
            sample_items: env_parse("GENERATION_SAMPLE_ITEMS")?
                .unwrap_or(generation_defaults.sample_items),
            sample_rows: generation_defaults.sample_rows,
        };
        if generation.batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "GENERATION_BATCH_SIZE must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            server,
            database,
            cors,
            model,
            generation,
            default_principal: env_string("DEFAULT_PRINCIPAL")
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    /// Check that a connection string is a postgres URL with a host and database
    fn validate_database_url(url: &str) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(url).map_err(|_| {
            ConfigError::InvalidValue(
                "Invalid DATABASE_URL format (expected postgresql://...)".to_string(),
            )
        })?;

        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(ConfigError::InvalidValue(format!(
                "Unsupported database scheme '{}'",
                parsed.scheme()
            )));
        }
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidValue(
                "Missing host in DATABASE_URL".to_string(),
            ));
        }
        if parsed.path().trim_start_matches('/').is_empty() {
            return Err(ConfigError::InvalidValue(
                "Missing database name in DATABASE_URL".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env_string(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(None),
    }
}
