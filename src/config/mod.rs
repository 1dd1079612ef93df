//! Configuration loading for the Enterprise API.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `ENTERPRISE_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::throttle::{ThrottleRate, ThrottleRateError};

const ENV_PREFIX: &str = "ENTERPRISE_";
const REDACTED: &str = "[REDACTED]";
const LOCAL_JWT_SECRET: &str = "local-development-secret";

/// Application configuration derived from `ENTERPRISE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Username whose requests count as the trusted enterprise service worker
    #[serde(default = "default_service_worker_username")]
    pub service_worker_username: String,
    /// Base URL of the course catalog service, always ending in `/`
    #[serde(default = "default_course_catalog_api_url")]
    pub course_catalog_api_url: String,
    #[serde(default = "default_catalog_api_timeout_ms")]
    pub catalog_api_timeout_ms: u64,
    /// Root of the LMS used when building course run enrollment links
    #[serde(default = "default_lms_root_url")]
    pub lms_root_url: String,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

/// Settings for validating incoming JWTs and minting tokens for the catalog service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct JwtConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(default = "default_jwt_issuer")]
    pub issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Lifetime of tokens minted for outbound catalog calls
    #[serde(default = "default_jwt_expiration_seconds")]
    pub expiration_seconds: u64,
}

/// Per-user request rates in `N/period` form (`60/minute`, `1000/day`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ThrottleConfig {
    #[serde(default = "default_throttle_user_rate")]
    pub user_rate: String,
    #[serde(default = "default_throttle_service_user_rate")]
    pub service_user_rate: String,
    /// Upper bound on the number of request histories kept in memory
    #[serde(default = "default_throttle_cache_capacity")]
    pub cache_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            service_worker_username: default_service_worker_username(),
            course_catalog_api_url: default_course_catalog_api_url(),
            catalog_api_timeout_ms: default_catalog_api_timeout_ms(),
            lms_root_url: default_lms_root_url(),
            jwt: JwtConfig::default(),
            throttle: ThrottleConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            issuer: default_jwt_issuer(),
            audience: None,
            expiration_seconds: default_jwt_expiration_seconds(),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            user_rate: default_throttle_user_rate(),
            service_user_rate: default_throttle_service_user_rate(),
            cache_capacity: default_throttle_cache_capacity(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl ThrottleConfig {
    /// Validate that both rates parse and the history cache can hold at least one user.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for rate in [&self.user_rate, &self.service_user_rate] {
            rate.parse::<ThrottleRate>()
                .map_err(|source| ConfigError::InvalidThrottleRate {
                    value: rate.clone(),
                    source,
                })?;
        }

        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidThrottleCacheCapacity);
        }

        Ok(())
    }
}

impl PaginationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > self.max_page_size {
            return Err(ConfigError::InvalidPageSize {
                page_size: self.page_size,
                max_page_size: self.max_page_size,
            });
        }
        Ok(())
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Local and test profiles relax secret requirements.
    pub fn is_development_profile(&self) -> bool {
        matches!(self.profile.as_str(), "local" | "test")
    }

    /// Shared HS256 secret. Development profiles fall back to a fixed value.
    pub fn jwt_secret(&self) -> &str {
        match self.jwt.secret_key.as_deref() {
            Some(secret) => secret,
            None => LOCAL_JWT_SECRET,
        }
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.jwt.secret_key.is_some() {
            config.jwt.secret_key = Some(REDACTED.to_string());
        }
        if let Ok(mut url) = Url::parse(&config.database_url)
            && url.password().is_some()
            && url.set_password(Some(REDACTED)).is_ok()
        {
            config.database_url = url.to_string();
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_development_profile()
            && self
                .jwt
                .secret_key
                .as_deref()
                .is_none_or(|secret| secret.is_empty())
        {
            return Err(ConfigError::MissingJwtSecret);
        }

        if self.service_worker_username.trim().is_empty() {
            return Err(ConfigError::MissingServiceWorkerUsername);
        }

        for (name, value) in [
            ("COURSE_CATALOG_API_URL", &self.course_catalog_api_url),
            ("LMS_ROOT_URL", &self.lms_root_url),
        ] {
            Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
                name,
                value: value.clone(),
                source,
            })?;
        }

        self.throttle.validate()?;
        self.pagination.validate()?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "postgresql://localhost:5432/enterprise".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_service_worker_username() -> String {
    "enterprise_worker".to_string()
}

fn default_course_catalog_api_url() -> String {
    "http://localhost:8008/api/v1/".to_string()
}

fn default_catalog_api_timeout_ms() -> u64 {
    5000
}

fn default_lms_root_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_jwt_issuer() -> String {
    "http://localhost:8000/oauth2".to_string()
}

fn default_jwt_expiration_seconds() -> u64 {
    30
}

fn default_throttle_user_rate() -> String {
    "60/minute".to_string()
}

fn default_throttle_service_user_rate() -> String {
    "600/minute".to_string()
}

fn default_throttle_cache_capacity() -> usize {
    10_000
}

fn default_page_size() -> u64 {
    10
}

fn default_max_page_size() -> u64 {
    100
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("invalid value '{value}' for {name}: expected {expected}")]
    InvalidNumber {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("JWT secret is missing; set ENTERPRISE_JWT_SECRET_KEY environment variable")]
    MissingJwtSecret,
    #[error("service worker username must not be empty")]
    MissingServiceWorkerUsername,
    #[error("invalid URL '{value}' for {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("invalid throttle rate '{value}': {source}")]
    InvalidThrottleRate {
        value: String,
        source: ThrottleRateError,
    },
    #[error("throttle cache capacity must be positive")]
    InvalidThrottleCacheCapacity,
    #[error("page size must be between 1 and max page size ({max_page_size}), got {page_size}")]
    InvalidPageSize { page_size: u64, max_page_size: u64 },
}

/// Loads configuration using layered `.env` files and `ENTERPRISE_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env`, `.env.local`, `.env.{profile}`, `.env.{profile}.local`, then
    /// the process environment, and validates the result.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let mut take = |key: &str| layered.remove(key).filter(|v| !v.trim().is_empty());

        let profile = take("PROFILE").unwrap_or(profile_hint);
        let api_bind_addr = take("API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take("LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format = take("LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url = take("DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = parse_number(
            "DB_MAX_CONNECTIONS",
            take("DB_MAX_CONNECTIONS"),
            default_db_max_connections,
        )?;
        let db_acquire_timeout_ms = parse_number(
            "DB_ACQUIRE_TIMEOUT_MS",
            take("DB_ACQUIRE_TIMEOUT_MS"),
            default_db_acquire_timeout_ms,
        )?;
        let service_worker_username =
            take("SERVICE_WORKER_USERNAME").unwrap_or_else(default_service_worker_username);

        let mut course_catalog_api_url =
            take("COURSE_CATALOG_API_URL").unwrap_or_else(default_course_catalog_api_url);
        if !course_catalog_api_url.ends_with('/') {
            course_catalog_api_url.push('/');
        }
        let catalog_api_timeout_ms = parse_number(
            "CATALOG_API_TIMEOUT_MS",
            take("CATALOG_API_TIMEOUT_MS"),
            default_catalog_api_timeout_ms,
        )?;
        let lms_root_url = take("LMS_ROOT_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(default_lms_root_url);

        let jwt = JwtConfig {
            secret_key: take("JWT_SECRET_KEY"),
            issuer: take("JWT_ISSUER").unwrap_or_else(default_jwt_issuer),
            audience: take("JWT_AUDIENCE"),
            expiration_seconds: parse_number(
                "JWT_EXPIRATION_SECONDS",
                take("JWT_EXPIRATION_SECONDS"),
                default_jwt_expiration_seconds,
            )?,
        };

        let throttle = ThrottleConfig {
            user_rate: take("THROTTLE_USER_RATE").unwrap_or_else(default_throttle_user_rate),
            service_user_rate: take("THROTTLE_SERVICE_USER_RATE")
                .unwrap_or_else(default_throttle_service_user_rate),
            cache_capacity: parse_number(
                "THROTTLE_CACHE_CAPACITY",
                take("THROTTLE_CACHE_CAPACITY"),
                default_throttle_cache_capacity,
            )?,
        };

        let pagination = PaginationConfig {
            page_size: parse_number("PAGE_SIZE", take("PAGE_SIZE"), default_page_size)?,
            max_page_size: parse_number(
                "MAX_PAGE_SIZE",
                take("MAX_PAGE_SIZE"),
                default_max_page_size,
            )?,
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            service_worker_username,
            course_catalog_api_url,
            catalog_api_timeout_ms,
            lms_root_url,
            jwt,
            throttle,
            pagination,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: fn() -> T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default()),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber {
                name,
                value,
                expected: "a non-negative integer",
            }),
    }
}
