use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use backoffice_application::{DEFAULT_FAN_OUT_CONCURRENCY, DEFAULT_PERMISSION_CACHE_TTL_SECONDS};
use backoffice_core::AppError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionCacheBackend {
    Redis { redis_url: String, key_prefix: String },
    InMemory,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub permission_cache_backend: PermissionCacheBackend,
    pub permission_cache_default_ttl_seconds: u64,
    pub data_scope_strict: bool,
    pub fan_out_concurrency: usize,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let permission_cache_backend = match env::var("PERMISSION_CACHE_BACKEND")
            .unwrap_or_else(|_| "in_memory".to_owned())
            .as_str()
        {
            "in_memory" => PermissionCacheBackend::InMemory,
            "redis" => PermissionCacheBackend::Redis {
                redis_url: required_non_empty_env("REDIS_URL")?,
                key_prefix: env::var("PERMISSION_CACHE_KEY_PREFIX")
                    .ok()
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| "backoffice:permissions".to_owned()),
            },
            other => {
                return Err(AppError::Validation(format!(
                    "PERMISSION_CACHE_BACKEND must be either 'redis' or 'in_memory', got '{other}'"
                )));
            }
        };

        let permission_cache_default_ttl_seconds = parse_positive_env(
            "PERMISSION_CACHE_DEFAULT_TTL_SECONDS",
            env::var("PERMISSION_CACHE_DEFAULT_TTL_SECONDS").ok(),
            DEFAULT_PERMISSION_CACHE_TTL_SECONDS,
        )?;
        let fan_out_concurrency = parse_positive_env(
            "FAN_OUT_CONCURRENCY",
            env::var("FAN_OUT_CONCURRENCY").ok(),
            DEFAULT_FAN_OUT_CONCURRENCY as u64,
        )? as usize;
        let data_scope_strict = parse_flag(env::var("DATA_SCOPE_STRICT").ok());

        Ok(Self {
            migrate_only,
            database_url,
            frontend_url,
            api_host,
            api_port,
            permission_cache_backend,
            permission_cache_default_ttl_seconds,
            data_scope_strict,
            fan_out_concurrency,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_positive_env(name: &str, value: Option<String>, default: u64) -> Result<u64, AppError> {
    let Some(value) = value.filter(|value| !value.trim().is_empty()) else {
        return Ok(default);
    };

    match value.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        Ok(_) => Err(AppError::Validation(format!("{name} must be greater than zero"))),
        Err(error) => Err(AppError::Validation(format!("invalid {name}: {error}"))),
    }
}

fn parse_flag(value: Option<String>) -> bool {
    value.is_some_and(|value| {
        let value = value.trim();
        value.eq_ignore_ascii_case("true") || value == "1"
    })
}
