use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::navigation::Navigator;
use crate::refresh::RefreshCoordinator;

/// Background refresh that keeps a live session from lapsing.
///
/// Ticks every `period` (first tick one period after start). A tick with no
/// token does nothing; a tick with a token refreshes through the shared
/// coordinator, so it never races a refresh already in flight. A failed
/// refresh has already cleared the store; the loop only navigates to
/// `login_route` and keeps ticking for the next session.
pub struct KeepAlive {
    handle: JoinHandle<()>,
}

impl KeepAlive {
    pub fn spawn(
        refresh: Arc<RefreshCoordinator>,
        navigator: Arc<dyn Navigator>,
        login_route: String,
        period: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if refresh.store().get().is_none() {
                    debug!("keep-alive idle; no session");
                    continue;
                }
                match refresh.refresh().await {
                    Ok(_) => debug!("keep-alive refreshed session"),
                    Err(err) => {
                        warn!(error = %err, "keep-alive refresh failed; redirecting to login");
                        navigator.navigate(&login_route);
                    }
                }
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
