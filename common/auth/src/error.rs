use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Session failures that callers resolve locally into a guard state or a
/// redirect. A malformed or expired token is not an error value: decoding
/// yields `None` and expiry is an input to the authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no valid session")]
    Unauthenticated,
    #[error("role '{}' is not permitted; required one of: {}", .role.as_deref().unwrap_or("<none>"), .required.join(", "))]
    Forbidden {
        role: Option<String>,
        required: Vec<String>,
    },
    #[error("session refresh failed: {0}")]
    RefreshFailed(String),
    #[error("token storage failure: {0}")]
    Storage(String),
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// True for failures that end the session and send the caller to login.
    pub fn is_session_teardown(&self) -> bool {
        matches!(self, AuthError::Unauthenticated | AuthError::RefreshFailed(_))
    }
}
