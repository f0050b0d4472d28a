use std::sync::{Mutex, PoisonError};

use common_auth::SessionConfig;
use tracing::info;

/// Redirect targets used by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    /// Authenticated but not entitled.
    Home,
    /// No usable session.
    Login,
}

impl Redirect {
    pub fn path<'a>(&self, config: &'a SessionConfig) -> &'a str {
        match self {
            Redirect::Home => &config.home_route,
            Redirect::Login => &config.login_route,
        }
    }
}

/// Performs an unconditional navigation (for a browser shell: replace the
/// location; for the CLI: report it).
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

/// Logs navigations; the default for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, target: &str) {
        info!(target_route = %target, "navigation requested");
    }
}

/// Keeps every navigation in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.to_string());
    }
}
