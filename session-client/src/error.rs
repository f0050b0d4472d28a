use common_auth::AuthError;
use reqwest::StatusCode;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {path}")]
    Status {
        status: StatusCode,
        path: String,
        body: String,
    },
    #[error("failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Transport { source, .. } => source.status(),
            _ => None,
        }
    }

    /// An authorization failure the client did not (or could not) recover.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// The session was torn down while serving this call.
    pub fn is_session_teardown(&self) -> bool {
        matches!(self, ClientError::Auth(err) if err.is_session_teardown())
    }
}
