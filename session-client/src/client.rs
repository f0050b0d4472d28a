//! Authenticated request client.
//!
//! Every outbound call carries the current bearer token. An unauthorized
//! response triggers at most one refresh-and-replay for that logical call;
//! the caller only ever sees the replayed outcome.

use std::sync::Arc;

use common_auth::{AuthError, SessionConfig};
use common_observability::SessionMetrics;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use crate::navigation::{Navigator, Redirect};
use crate::refresh::RefreshCoordinator;
use crate::store::{AccessToken, TokenStore};

/// Replays allowed per logical request.
pub const MAX_REPLAYS: u8 = 1;

/// Replayable description of an API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json_value(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> ClientResult<Self> {
        let value = serde_json::to_value(body)
            .map_err(|err| ClientError::InvalidRequest(err.to_string()))?;
        Ok(self.json_value(value))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Buffered response of a successful call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    path: String,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_slice(&self.body).map_err(|err| ClientError::Decode {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }
}

/// Why an unauthorized response is, or is not, recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Attempt,
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyReplayed,
    RefreshEndpoint,
    LoginEndpoint,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlreadyReplayed => "retry_exhausted",
            SkipReason::RefreshEndpoint => "refresh_endpoint",
            SkipReason::LoginEndpoint => "login_endpoint",
        }
    }
}

/// Recovery is attempted only for a call that has not been replayed yet and
/// that targets neither the refresh nor the login endpoint.
pub fn recovery_for(config: &SessionConfig, path: &str, replays: u8) -> Recovery {
    if replays >= MAX_REPLAYS {
        Recovery::Skip(SkipReason::AlreadyReplayed)
    } else if config.is_refresh_call(path) {
        Recovery::Skip(SkipReason::RefreshEndpoint)
    } else if config.is_login_call(path) {
        Recovery::Skip(SkipReason::LoginEndpoint)
    } else {
        Recovery::Attempt
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: Arc<SessionConfig>,
    store: TokenStore,
    refresh: Arc<RefreshCoordinator>,
    navigator: Arc<dyn Navigator>,
    metrics: SessionMetrics,
}

impl ApiClient {
    pub fn new(
        http: Client,
        config: Arc<SessionConfig>,
        refresh: Arc<RefreshCoordinator>,
        navigator: Arc<dyn Navigator>,
        metrics: SessionMetrics,
    ) -> Self {
        let store = refresh.store().clone();
        Self {
            http,
            config,
            store,
            refresh,
            navigator,
            metrics,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(&ApiRequest::get(path)).await?.json()
    }

    /// Sends `request`, recovering once from an authorization failure.
    ///
    /// Non-success statuses other than a recoverable 401 come back as
    /// [`ClientError::Status`]. When the refresh fails the session is torn
    /// down, the navigator is sent to the login route and the call fails with
    /// [`ClientError::Auth`].
    pub async fn send(&self, request: &ApiRequest) -> ClientResult<ApiResponse> {
        let span = info_span!(
            "api_request",
            request_id = %Uuid::new_v4(),
            method = %request.method,
            path = %request.path,
        );
        self.send_with_recovery(request).instrument(span).await
    }

    async fn send_with_recovery(&self, request: &ApiRequest) -> ClientResult<ApiResponse> {
        let mut replays = 0u8;
        loop {
            let token = self.store.get();
            let response = self.dispatch(request, token.as_ref()).await?;
            if response.status != StatusCode::UNAUTHORIZED {
                return into_result(response);
            }

            match recovery_for(&self.config, &request.path, replays) {
                Recovery::Skip(reason) => {
                    debug!(reason = reason.as_str(), "unauthorized response not recovered");
                    self.metrics.request_recovery(reason.as_str());
                    return into_result(response);
                }
                Recovery::Attempt => {}
            }

            let current = self.store.get();
            if token.is_some() && current.is_none() {
                // Another caller's refresh already failed and ended the session.
                debug!("session cleared since dispatch; not refreshing again");
                self.metrics.request_recovery("session_ended");
                return Err(ClientError::Auth(AuthError::Unauthenticated));
            }
            if current.is_some() && current != token {
                // Another caller rotated the token while this one was in flight.
                debug!("token changed since dispatch; replaying without refresh");
            } else if let Err(err) = self.refresh.refresh().await {
                self.teardown(&err);
                return Err(ClientError::Auth(err));
            }

            self.metrics.request_recovery("replayed");
            replays += 1;
            debug!(attempt = replays + 1, "replaying request with refreshed token");
        }
    }

    fn teardown(&self, err: &AuthError) {
        warn!(error = %err, "session could not be refreshed; redirecting to login");
        self.metrics.request_recovery("refresh_failed");
        self.navigator.navigate(Redirect::Login.path(&self.config));
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&AccessToken>,
    ) -> ClientResult<ApiResponse> {
        let url = self.config.url(&request.path);
        let mut builder = self.http.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token.as_str());
        }

        let transport = |source: reqwest::Error| ClientError::Transport {
            path: request.path.clone(),
            source,
        };
        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;
        debug!(status = status.as_u16(), "response received");

        Ok(ApiResponse {
            status,
            path: request.path.clone(),
            body: body.to_vec(),
        })
    }
}

fn into_result(response: ApiResponse) -> ClientResult<ApiResponse> {
    if response.status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status {
            status: response.status,
            body: response.text(),
            path: response.path,
        })
    }
}
