//! Environment-driven server settings.

use jsonwebtoken::Algorithm;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8002";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub api_prefix: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let listen_raw = var("ACCOUNTANT_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into());
        let listen_addr = listen_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid("ACCOUNTANT_LISTEN_ADDR", listen_raw.clone()))?;

        let jwt_secret = var("JWT_SECRET_KEY").ok_or(ConfigError::Missing("JWT_SECRET_KEY"))?;

        let jwt_algorithm = match var("JWT_ALGORITHM").as_deref().unwrap_or("HS256") {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => return Err(ConfigError::Invalid("JWT_ALGORITHM", other.to_string())),
        };

        let allowed_origins = match var("ALLOWED_ORIGINS") {
            None => Vec::new(),
            Some(raw) if raw == "*" => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
        };

        let api_prefix = var("API_V1_PREFIX")
            .map(|prefix| format!("/{}", prefix.trim_matches('/')))
            .unwrap_or_else(|| DEFAULT_API_PREFIX.into());

        Ok(Self {
            listen_addr,
            data_dir: PathBuf::from(var("ACCOUNTANT_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into())),
            jwt_secret,
            jwt_algorithm,
            allowed_origins,
            api_prefix,
        })
    }
}
