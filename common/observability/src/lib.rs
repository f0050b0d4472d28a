use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for the session lifecycle: refresh exchanges, recovery of
/// unauthorized requests, and route guard decisions.
#[derive(Clone)]
pub struct SessionMetrics {
    registry: Registry,
    refreshes: IntCounterVec,
    request_recovery: IntCounterVec,
    guard_decisions: IntCounterVec,
}

impl SessionMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let refreshes = IntCounterVec::new(
            Opts::new(
                "session_refresh_total",
                "Refresh exchanges grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(refreshes.clone()))?;

        let request_recovery = IntCounterVec::new(
            Opts::new(
                "session_request_recovery_total",
                "Handling of unauthorized responses grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(request_recovery.clone()))?;

        let guard_decisions = IntCounterVec::new(
            Opts::new(
                "session_guard_decisions_total",
                "Route guard evaluations grouped by decision",
            ),
            &["decision"],
        )?;
        registry.register(Box::new(guard_decisions.clone()))?;

        Ok(Self {
            registry,
            refreshes,
            request_recovery,
            guard_decisions,
        })
    }

    /// `outcome` is one of `success`, `failure`, `joined`.
    pub fn refresh(&self, outcome: &str) {
        self.refreshes.with_label_values(&[outcome]).inc();
    }

    pub fn request_recovery(&self, outcome: &str) {
        self.request_recovery.with_label_values(&[outcome]).inc();
    }

    pub fn guard_decision(&self, decision: &str) {
        self.guard_decisions.with_label_values(&[decision]).inc();
    }

    pub fn refresh_count(&self, outcome: &str) -> u64 {
        self.refreshes.with_label_values(&[outcome]).get()
    }

    pub fn request_recovery_count(&self, outcome: &str) -> u64 {
        self.request_recovery.with_label_values(&[outcome]).get()
    }

    pub fn guard_decision_count(&self, decision: &str) -> u64 {
        self.guard_decisions.with_label_values(&[decision]).get()
    }

    /// Text exposition of every registered counter.
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
