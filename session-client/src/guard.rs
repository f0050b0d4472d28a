//! Route guard: decides per protected view whether to render it, send the
//! caller to login, or send them home.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common_auth::{authorize, authorize_role, AllowedRoleSet, Decision, SessionConfig};
use common_observability::SessionMetrics;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::navigation::Redirect;
use crate::refresh::RefreshCoordinator;
use crate::store::{AccessToken, TokenStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeniedReason {
    Forbidden,
    Unauthenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthState {
    Loading,
    Allowed,
    Denied(DeniedReason),
}

impl From<Decision> for AuthState {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allowed => AuthState::Allowed,
            Decision::Forbidden => AuthState::Denied(DeniedReason::Forbidden),
            Decision::Unauthenticated => AuthState::Denied(DeniedReason::Unauthenticated),
        }
    }
}

/// What the view layer does with a guard state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderAction {
    Placeholder,
    Render,
    Redirect(String),
}

impl AuthState {
    pub fn render(&self, config: &SessionConfig) -> RenderAction {
        match self {
            AuthState::Loading => RenderAction::Placeholder,
            AuthState::Allowed => RenderAction::Render,
            AuthState::Denied(DeniedReason::Forbidden) => {
                RenderAction::Redirect(Redirect::Home.path(config).to_string())
            }
            AuthState::Denied(DeniedReason::Unauthenticated) => {
                RenderAction::Redirect(Redirect::Login.path(config).to_string())
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuthState::Loading)
    }
}

/// Inputs a decision was computed from.
#[derive(Debug, Clone)]
struct Evaluated {
    token: Option<AccessToken>,
    roles: AllowedRoleSet,
    expires_at: Option<DateTime<Utc>>,
    /// The token came from a refresh and only its role was checked.
    refreshed: bool,
}

pub struct RouteGuard {
    store: TokenStore,
    refresh: Arc<RefreshCoordinator>,
    metrics: SessionMetrics,
    allowed: AllowedRoleSet,
    state: AuthState,
    evaluated: Option<Evaluated>,
    changes: watch::Receiver<Option<AccessToken>>,
}

impl RouteGuard {
    pub fn new(
        refresh: Arc<RefreshCoordinator>,
        allowed: AllowedRoleSet,
        metrics: SessionMetrics,
    ) -> Self {
        let store = refresh.store().clone();
        let changes = store.subscribe();
        Self {
            store,
            refresh,
            metrics,
            allowed,
            state: AuthState::Loading,
            evaluated: None,
            changes,
        }
    }

    pub fn allowed_roles(&self) -> &AllowedRoleSet {
        &self.allowed
    }

    /// Changing the role set invalidates the current decision.
    pub fn set_allowed_roles(&mut self, allowed: AllowedRoleSet) {
        self.allowed = allowed;
    }

    /// Current state. Reads as `Loading` whenever the token or role set
    /// changed since the last evaluation, so a cleared token never leaves a
    /// stale `Allowed` behind.
    pub fn state(&self) -> AuthState {
        if self.is_current(Utc::now()) {
            self.state
        } else {
            AuthState::Loading
        }
    }

    fn is_current(&self, now: DateTime<Utc>) -> bool {
        let Some(evaluated) = &self.evaluated else {
            return false;
        };
        if evaluated.roles != self.allowed || evaluated.token != self.store.get() {
            return false;
        }
        if evaluated.refreshed {
            return true;
        }
        match self.state {
            AuthState::Allowed | AuthState::Denied(DeniedReason::Forbidden) => {
                evaluated.expires_at.is_some_and(|expires_at| expires_at > now)
            }
            _ => true,
        }
    }

    /// Runs the transition logic unless the previous decision still holds.
    ///
    /// A valid token is decided locally. An absent, undecodable or expired
    /// token costs exactly one refresh; the new token then gets the role
    /// check, and a failed refresh ends in `Denied(Unauthenticated)` with the
    /// store cleared. A decision on a refreshed token holds until the token or
    /// role set changes, whatever its `exp` says.
    pub async fn evaluate(&mut self) -> AuthState {
        let now = Utc::now();
        if self.is_current(now) {
            return self.state;
        }

        self.state = AuthState::Loading;
        let token = self.store.get();
        let payload = token.as_ref().and_then(AccessToken::decode);

        let decision = authorize(payload.as_ref(), &self.allowed, now);
        let (decision, token, payload, refreshed) = match decision {
            Decision::Unauthenticated => {
                debug!(present = token.is_some(), "no usable token; refreshing");
                match self.refresh.refresh().await {
                    Ok(fresh) => {
                        let payload = fresh.decode();
                        match authorize_role(payload.as_ref(), &self.allowed) {
                            Decision::Unauthenticated => {
                                warn!("refreshed token has no readable payload; clearing session");
                                if let Err(err) = self.store.clear() {
                                    debug!(error = %err, "stored token could not be removed");
                                }
                                (Decision::Unauthenticated, None, None, false)
                            }
                            decision => (decision, Some(fresh), payload, true),
                        }
                    }
                    Err(err) => {
                        debug!(error = %err, "refresh failed during route check");
                        (Decision::Unauthenticated, None, None, false)
                    }
                }
            }
            decision => (decision, token, payload, false),
        };

        self.metrics.guard_decision(decision.as_str());
        debug!(decision = decision.as_str(), roles = %self.allowed, "route guard decided");

        self.state = AuthState::from(decision);
        self.evaluated = Some(Evaluated {
            token,
            roles: self.allowed.clone(),
            expires_at: payload.and_then(|payload| payload.expires_at),
            refreshed,
        });
        let _ = self.changes.borrow_and_update();
        self.state
    }

    /// Waits for the token to change, then re-evaluates.
    pub async fn next_change(&mut self) -> AuthState {
        if self.changes.changed().await.is_err() {
            debug!("token store dropped; keeping last decision");
        }
        self.evaluate().await
    }

    pub fn render(&self, config: &SessionConfig) -> RenderAction {
        self.state().render(config)
    }
}
