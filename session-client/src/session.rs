//! Wiring of store, refresh coordinator, request client and guards into one
//! handle per process.

use std::sync::Arc;
use std::time::Duration;

use common_auth::{AllowedRoleSet, AuthError, DecodedPayload, SessionConfig};
use common_observability::SessionMetrics;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::client::{ApiClient, ApiRequest};
use crate::error::{ClientError, ClientResult};
use crate::guard::RouteGuard;
use crate::keepalive::KeepAlive;
use crate::navigation::{Navigator, Redirect, TracingNavigator};
use crate::refresh::{RefreshClient, RefreshCoordinator, Refresher, TokenResponse};
use crate::storage::{DurableStorage, MemoryStorage};
use crate::store::{AccessToken, TokenStore};

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

pub struct SessionClientBuilder {
    config: SessionConfig,
    storage: Option<Arc<dyn DurableStorage>>,
    navigator: Option<Arc<dyn Navigator>>,
    refresher: Option<Arc<dyn Refresher>>,
    http: Option<Client>,
    metrics: Option<SessionMetrics>,
    request_timeout: Option<Duration>,
}

impl SessionClientBuilder {
    pub fn storage(mut self, storage: Arc<dyn DurableStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Replaces the HTTP refresh exchange.
    pub fn refresher(mut self, refresher: Arc<dyn Refresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// HTTP client for API calls and the default refresher. It must keep a
    /// cookie store for the refresh credential to travel.
    pub fn http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn metrics(mut self, metrics: SessionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> ClientResult<SessionClient> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder = Client::builder().cookie_store(true);
                if let Some(timeout) = self.request_timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build().map_err(|err| {
                    ClientError::Auth(AuthError::InvalidConfig(format!(
                        "failed to build HTTP client: {err}"
                    )))
                })?
            }
        };

        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => SessionMetrics::new().map_err(|err| {
                ClientError::Auth(AuthError::InvalidConfig(format!(
                    "failed to register metrics: {err}"
                )))
            })?,
        };

        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let store = TokenStore::open(storage, config.storage_key.clone())?;

        let refresher = self.refresher.unwrap_or_else(|| {
            Arc::new(RefreshClient::new(
                http.clone(),
                config.url(&config.refresh_path),
            ))
        });
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(TracingNavigator));

        let refresh = Arc::new(RefreshCoordinator::new(
            refresher,
            store.clone(),
            metrics.clone(),
        ));
        let api = ApiClient::new(
            http,
            Arc::clone(&config),
            Arc::clone(&refresh),
            Arc::clone(&navigator),
            metrics.clone(),
        );

        Ok(SessionClient {
            config,
            store,
            refresh,
            api,
            navigator,
            metrics,
        })
    }
}

/// Process-wide session handle. Cheap to clone.
#[derive(Clone)]
pub struct SessionClient {
    config: Arc<SessionConfig>,
    store: TokenStore,
    refresh: Arc<RefreshCoordinator>,
    api: ApiClient,
    navigator: Arc<dyn Navigator>,
    metrics: SessionMetrics,
}

impl SessionClient {
    pub fn builder(config: SessionConfig) -> SessionClientBuilder {
        SessionClientBuilder {
            config,
            storage: None,
            navigator: None,
            refresher: None,
            http: None,
            metrics: None,
            request_timeout: None,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Exchanges credentials for an access token and stores it. The refresh
    /// credential arrives as a cookie and stays in the HTTP client.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<DecodedPayload> {
        let request = ApiRequest::post(self.config.login_path.clone())
            .json(&Credentials { email, password })?;
        let body: TokenResponse = self.api.send(&request).await?.json()?;

        let token = AccessToken::new(body.access_token);
        let Some(payload) = token.decode() else {
            warn!("login response carried an unreadable token");
            return Err(AuthError::Unauthenticated.into());
        };
        self.store.set(token)?;
        info!(
            user = payload.subject().unwrap_or("unknown"),
            role = payload.role.as_deref().unwrap_or("none"),
            "signed in"
        );
        Ok(payload)
    }

    /// Ends the session. Local state is dropped and the navigator sent to
    /// login whether or not the server call succeeds.
    pub async fn logout(&self) {
        let request = ApiRequest::post(self.config.logout_path.clone());
        if let Err(err) = self.api.send(&request).await {
            warn!(error = %err, "logout call failed; clearing local session anyway");
        }
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear persisted session");
        }
        info!("signed out");
        self.navigator.navigate(Redirect::Login.path(&self.config));
    }

    /// Runs one refresh through the shared coordinator.
    pub async fn refresh(&self) -> ClientResult<AccessToken> {
        Ok(self.refresh.refresh().await?)
    }

    /// Payload of the stored token; no network I/O.
    pub fn current_user(&self) -> Option<DecodedPayload> {
        self.store.payload()
    }

    pub fn guard(&self, allowed: AllowedRoleSet) -> RouteGuard {
        RouteGuard::new(Arc::clone(&self.refresh), allowed, self.metrics.clone())
    }

    pub fn spawn_keep_alive(&self) -> KeepAlive {
        KeepAlive::spawn(
            Arc::clone(&self.refresh),
            Arc::clone(&self.navigator),
            self.config.login_route.clone(),
            self.config.keep_alive,
        )
    }
}
