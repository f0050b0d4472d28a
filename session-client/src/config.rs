use anyhow::{Context, Result};
use common_auth::config::{
    DEFAULT_HOME_ROUTE, DEFAULT_LOGIN_PATH, DEFAULT_LOGIN_ROUTE, DEFAULT_LOGOUT_PATH,
    DEFAULT_REFRESH_PATH, DEFAULT_STORAGE_KEY,
};
use common_auth::SessionConfig;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub session: SessionConfig,
    pub storage_dir: PathBuf,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup("SESSION_API_BASE_URL").context("SESSION_API_BASE_URL must be set")?;
        let refresh_path =
            lookup("SESSION_REFRESH_PATH").unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_string());
        let login_path =
            lookup("SESSION_LOGIN_PATH").unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string());
        let logout_path =
            lookup("SESSION_LOGOUT_PATH").unwrap_or_else(|| DEFAULT_LOGOUT_PATH.to_string());
        let storage_key =
            lookup("SESSION_STORAGE_KEY").unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string());
        let storage_dir = lookup("SESSION_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".session"));
        let keep_alive_secs = lookup("SESSION_KEEPALIVE_SECONDS")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(600);
        let login_route =
            lookup("SESSION_LOGIN_ROUTE").unwrap_or_else(|| DEFAULT_LOGIN_ROUTE.to_string());
        let home_route =
            lookup("SESSION_HOME_ROUTE").unwrap_or_else(|| DEFAULT_HOME_ROUTE.to_string());
        let request_timeout_secs = lookup("SESSION_REQUEST_TIMEOUT_SECONDS")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(30);

        let session = SessionConfig::new(base_url)
            .with_refresh_path(refresh_path)
            .with_login_path(login_path)
            .with_logout_path(logout_path)
            .with_storage_key(storage_key)
            .with_routes(login_route, home_route)
            .with_keep_alive(Duration::from_secs(keep_alive_secs.max(30)));
        session.validate().context("invalid session configuration")?;

        Ok(Self {
            session,
            storage_dir,
            request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
        })
    }
}
