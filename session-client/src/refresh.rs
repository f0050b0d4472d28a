//! Refresh exchange and its single-flight coordinator.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use common_auth::{AuthError, AuthResult};
use common_observability::SessionMetrics;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::store::{AccessToken, TokenStore};

/// Mints a new access token from the ambient long-lived credential.
/// One attempt per call; no retry policy of its own.
#[async_trait]
pub trait Refresher: Send + Sync {
    async fn refresh(&self) -> AuthResult<AccessToken>;
}

/// Body returned by the login and refresh endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    pub access_token: String,
}

/// `POST` to the refresh endpoint. The credential travels in the HTTP
/// client's cookie jar, never through this type.
#[derive(Clone)]
pub struct RefreshClient {
    client: Client,
    url: String,
}

impl RefreshClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Refresher for RefreshClient {
    async fn refresh(&self) -> AuthResult<AccessToken> {
        let response = self
            .client
            .post(&self.url)
            .send()
            .await
            .map_err(|err| AuthError::RefreshFailed(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::RefreshFailed(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| AuthError::RefreshFailed(format!("malformed refresh response: {err}")))?;

        if body.access_token.trim().is_empty() {
            return Err(AuthError::RefreshFailed(
                "refresh response carried an empty token".to_string(),
            ));
        }

        Ok(AccessToken::new(body.access_token))
    }
}

type SharedRefresh = Shared<BoxFuture<'static, AuthResult<AccessToken>>>;

/// Deduplicates concurrent refreshes: the first caller starts the exchange,
/// callers arriving while it is pending await the same result. The outcome is
/// applied to the token store exactly once: stored on success, cleared on
/// failure.
pub struct RefreshCoordinator {
    refresher: Arc<dyn Refresher>,
    store: TokenStore,
    metrics: SessionMetrics,
    in_flight: Mutex<InFlight>,
}

#[derive(Default)]
struct InFlight {
    generation: u64,
    pending: Option<SharedRefresh>,
}

impl RefreshCoordinator {
    pub fn new(refresher: Arc<dyn Refresher>, store: TokenStore, metrics: SessionMetrics) -> Self {
        Self {
            refresher,
            store,
            metrics,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Whether a refresh is pending right now.
    pub fn is_refreshing(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .is_some()
    }

    pub async fn refresh(&self) -> AuthResult<AccessToken> {
        let (generation, pending) = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match &slot.pending {
                Some(pending) => {
                    debug!("joining in-flight refresh");
                    self.metrics.refresh("joined");
                    (slot.generation, pending.clone())
                }
                None => {
                    slot.generation += 1;
                    let pending = self.exchange().boxed().shared();
                    slot.pending = Some(pending.clone());
                    (slot.generation, pending)
                }
            }
        };

        let outcome = pending.await;

        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.generation == generation {
            slot.pending = None;
        }
        outcome
    }

    fn exchange(&self) -> impl Future<Output = AuthResult<AccessToken>> + Send + 'static {
        let refresher = Arc::clone(&self.refresher);
        let store = self.store.clone();
        let metrics = self.metrics.clone();

        async move {
            let result = match refresher.refresh().await {
                Ok(token) => store.set(token.clone()).map(|()| token),
                Err(err) => Err(err),
            };

            match result {
                Ok(token) => {
                    metrics.refresh("success");
                    info!("access token refreshed");
                    Ok(token)
                }
                Err(err) => {
                    metrics.refresh("failure");
                    warn!(error = %err, "refresh failed; clearing session");
                    if let Err(err) = store.clear() {
                        debug!(error = %err, "stored token could not be removed");
                    }
                    Err(err)
                }
            }
        }
    }
}
