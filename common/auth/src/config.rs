use std::time::Duration;

use crate::error::{AuthError, AuthResult};

pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_LOGOUT_PATH: &str = "/auth/logout";
pub const DEFAULT_STORAGE_KEY: &str = "accessToken";
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";
pub const DEFAULT_HOME_ROUTE: &str = "/";

/// Endpoints, storage key and redirect targets shared by the request client
/// and the route guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Base URL of the backend API, without a trailing slash.
    pub base_url: String,
    /// Endpoint that mints a new access token from the ambient credential.
    pub refresh_path: String,
    /// Login endpoint; authorization failures here are never recovered.
    pub login_path: String,
    pub logout_path: String,
    /// Durable storage key holding the raw token.
    pub storage_key: String,
    /// Redirect target for unauthenticated callers.
    pub login_route: String,
    /// Redirect target for authenticated callers lacking the role.
    pub home_route: String,
    /// Interval of the background keep-alive refresh.
    pub keep_alive: Duration,
}

impl SessionConfig {
    /// Construct config with the application's defaults (10 minute keep-alive).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            home_route: DEFAULT_HOME_ROUTE.to_string(),
            keep_alive: Duration::from_secs(10 * 60),
        }
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = path.into();
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_routes(mut self, login: impl Into<String>, home: impl Into<String>) -> Self {
        self.login_route = login.into();
        self.home_route = home.into();
        self
    }

    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    /// Joins `path` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Whether `path` targets the refresh endpoint (substring match).
    pub fn is_refresh_call(&self, path: &str) -> bool {
        path.contains(&self.refresh_path)
    }

    /// Whether `path` targets the login endpoint (substring match).
    pub fn is_login_call(&self, path: &str) -> bool {
        path.contains(&self.login_path)
    }

    pub fn validate(&self) -> AuthResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(AuthError::InvalidConfig(format!(
                "base URL '{}' must be http(s)",
                self.base_url
            )));
        }
        for (name, value) in [
            ("refresh path", &self.refresh_path),
            ("login path", &self.login_path),
            ("storage key", &self.storage_key),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        if self.keep_alive.is_zero() {
            return Err(AuthError::InvalidConfig(
                "keep-alive interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
