pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod keepalive;
pub mod navigation;
pub mod refresh;
pub mod routes;
pub mod session;
pub mod storage;
pub mod store;

pub use client::{recovery_for, ApiClient, ApiRequest, ApiResponse, Recovery, SkipReason};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use guard::{AuthState, DeniedReason, RenderAction, RouteGuard};
pub use keepalive::KeepAlive;
pub use navigation::{Navigator, RecordingNavigator, Redirect, TracingNavigator};
pub use refresh::{RefreshClient, RefreshCoordinator, Refresher};
pub use routes::{RouteAccess, RouteTable};
pub use session::{SessionClient, SessionClientBuilder};
pub use storage::{DurableStorage, FileStorage, MemoryStorage};
pub use store::{AccessToken, TokenStore};
