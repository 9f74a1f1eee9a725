/// Counts consecutive cycles that died on authentication and decides when the
/// operator has to hear about it. Fires once per streak.
#[derive(Debug, Clone)]
pub struct AuthEscalation {
    threshold: u32,
    consecutive: u32,
}

impl AuthEscalation {
    /// A threshold of zero disables escalation.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive: 0,
        }
    }

    /// Records an auth-failed cycle. Returns true exactly when the streak reaches the threshold.
    pub fn record_auth_failure(&mut self) -> bool {
        self.consecutive = self.consecutive.saturating_add(1);
        self.threshold > 0 && self.consecutive == self.threshold
    }

    /// A fetch went through, so the credentials work again.
    pub fn record_success(&mut self) {
        if self.consecutive > 0 {
            tracing::info!(
                "🔑 Marketplace authentication recovered after {} failed cycles",
                self.consecutive
            );
        }
        self.consecutive = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }
}
