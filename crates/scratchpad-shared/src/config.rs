//! Configuration management

use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::constants::{
    DEFAULT_AUTHORITY_BASE_URL, DEFAULT_JWKS_CACHE_MAX_AGE_SECS, DEFAULT_JWKS_CACHE_MAX_ENTRIES,
    DEFAULT_JWKS_FETCH_TIMEOUT_SECS,
};
use crate::error::AppError;

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub server: ServerSettings,
    #[validate(nested)]
    pub authority: AuthoritySettings,
    #[validate(nested)]
    pub session: SessionSettings,
    #[validate(nested)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ServerSettings {
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    /// Public base URL, used for the resource metadata document.
    #[validate(url)]
    pub base_url: String,
}

/// Identity authority (Azure AD v2 style tenant endpoints).
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AuthoritySettings {
    #[validate(url)]
    pub base_url: String,
    #[validate(custom(function = "validate_tenant_id"))]
    pub tenant_id: String,
    #[validate(length(min = 1, message = "audience must not be empty"))]
    pub audience: String,
    #[validate(length(min = 1, message = "at least one allowed scope is required"))]
    pub allowed_scopes: Vec<String>,
    /// Overrides the issuer derived from `base_url` and `tenant_id`.
    pub issuer: Option<String>,
    /// Overrides the JWKS location derived from `base_url` and `tenant_id`.
    pub jwks_uri: Option<String>,
    #[validate(range(min = 1))]
    pub jwks_cache_max_entries: u64,
    #[validate(range(min = 1))]
    pub jwks_cache_max_age_secs: u64,
    #[validate(range(min = 1))]
    pub jwks_fetch_timeout_secs: u64,
    pub leeway_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct SessionSettings {
    /// Inactivity limit, at most one year. No sweeper runs when unset.
    #[validate(range(min = 1, max = 525600))]
    pub ttl_minutes: Option<u64>,
    /// Reject resumption or termination of a session owned by another identity.
    pub enforce_owner: bool,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct LoggingSettings {
    #[validate(custom(function = "validate_log_level"))]
    pub level: String,
    pub json: bool,
}

impl AuthoritySettings {
    fn tenant_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.tenant_id)
    }

    pub fn issuer(&self) -> String {
        self.issuer
            .clone()
            .unwrap_or_else(|| format!("{}/v2.0", self.tenant_url()))
    }

    pub fn jwks_uri(&self) -> String {
        self.jwks_uri
            .clone()
            .unwrap_or_else(|| format!("{}/discovery/v2.0/keys", self.tenant_url()))
    }

    pub fn authorization_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.tenant_url())
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.tenant_url())
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl SessionSettings {
    pub fn ttl(&self) -> Option<std::time::Duration> {
        self.ttl_minutes
            .map(|minutes| std::time::Duration::from_secs(minutes * 60))
    }
}

impl Settings {
    /// Loads `.env`, built-in defaults, `config/settings.*`, then `SCRATCHPAD_*` variables.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let builder = Self::defaults()?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("SCRATCHPAD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(" ")
                    .with_list_parse_key("authority.allowed_scopes"),
            );
        Self::from_builder(builder)
    }

    /// Builder pre-populated with every default; callers layer sources on top.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, AppError> {
        Ok(Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.base_url", "http://localhost:3000")?
            .set_default("authority.base_url", DEFAULT_AUTHORITY_BASE_URL)?
            .set_default("authority.tenant_id", "")?
            .set_default("authority.audience", "")?
            .set_default("authority.allowed_scopes", Vec::<String>::new())?
            .set_default("authority.jwks_cache_max_entries", DEFAULT_JWKS_CACHE_MAX_ENTRIES)?
            .set_default("authority.jwks_cache_max_age_secs", DEFAULT_JWKS_CACHE_MAX_AGE_SECS)?
            .set_default("authority.jwks_fetch_timeout_secs", DEFAULT_JWKS_FETCH_TIMEOUT_SECS)?
            .set_default("authority.leeway_secs", 0)?
            .set_default("session.enforce_owner", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", true)?)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, AppError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}

fn validate_tenant_id(value: &str) -> Result<(), ValidationError> {
    uuid::Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("tenant_id_not_uuid"))
}

fn validate_log_level(value: &str) -> Result<(), ValidationError> {
    match value {
        "error" | "warn" | "info" | "debug" => Ok(()),
        _ => Err(ValidationError::new("unknown_log_level")),
    }
}
