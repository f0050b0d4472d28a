#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use common_auth::SessionConfig;
use httpmock::MockServer;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use session_client::{AccessToken, RecordingNavigator, SessionClient};

#[derive(Serialize)]
struct TokenClaims<'a> {
    id: u64,
    email: &'a str,
    role: &'a str,
    iat: i64,
    exp: i64,
}

/// HS256 token as the backend would mint it; only the payload matters here.
pub fn issue_token(role: &str, ttl_secs: i64) -> String {
    let now = Utc::now();
    let claims = TokenClaims {
        id: 42,
        email: "learner@example.com",
        role,
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"server-only-secret"),
    )
    .expect("sign token")
}

pub fn refresh_body(token: &str) -> String {
    serde_json::json!({ "accessToken": token }).to_string()
}

pub struct Harness {
    pub session: SessionClient,
    pub navigator: Arc<RecordingNavigator>,
}

impl Harness {
    pub fn new(server: &MockServer) -> Self {
        let navigator = Arc::new(RecordingNavigator::new());
        let session = SessionClient::builder(SessionConfig::new(server.base_url()))
            .navigator(navigator.clone())
            .build()
            .expect("session client");
        Self { session, navigator }
    }

    pub fn signed_in(server: &MockServer, token: &str) -> Self {
        let harness = Self::new(server);
        harness
            .session
            .store()
            .set(AccessToken::new(token))
            .expect("seed token");
        harness
    }

    pub fn token(&self) -> Option<String> {
        self.session.store().get().map(AccessToken::into_string)
    }
}
