use std::{env, net::SocketAddr, path::PathBuf};

use url::Url;

use crate::error::AppError;

pub const DEFAULT_MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub data_root: PathBuf,
    pub api_base_url: Url,
    pub cookie_secret: String,
    pub max_photo_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://fleet.db?mode=rwc".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let data_root = env::var("DATA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let api_base_url = parse_base_url(
            &env::var("API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8000/api/".to_string()),
        )?;

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-fleet-console-cookie-secret".to_string());

        let max_photo_bytes = match env::var("MAX_PHOTO_BYTES") {
            Ok(raw) => raw
                .parse()
                .map_err(|err| AppError::Config(format!("invalid MAX_PHOTO_BYTES: {err}")))?,
            Err(_) => DEFAULT_MAX_PHOTO_BYTES,
        };

        Ok(Self {
            database_url,
            listen_addr,
            data_root,
            api_base_url,
            cookie_secret,
            max_photo_bytes,
        })
    }
}

/// Endpoint paths are joined onto the base, so it must end with a slash or
/// the last path segment gets replaced.
pub fn parse_base_url(raw: &str) -> Result<Url, AppError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized)
        .map_err(|err| AppError::Config(format!("invalid API_BASE_URL: {err}")))
}
