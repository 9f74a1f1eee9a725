use thiserror::Error;

/// Outcome taxonomy for calls against the marketplace (token endpoint included).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Credential exchange rejected, or the API kept refusing a freshly refreshed token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Rate limited, server-side failure, or the request never completed.
    #[error("transient API failure{}: {message}", status_suffix(.status))]
    Transient { status: Option<u16>, message: String },

    /// The response did not have the shape we expect.
    #[error("unexpected API response: {0}")]
    Data(String),
}

impl ApiError {
    pub fn transient(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transient {
            status,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Data(err.to_string())
        } else {
            // timeouts, connect failures and body read errors are all worth another attempt
            Self::transient(err.status().map(|s| s.as_u16()), err.to_string())
        }
    }
}

/// The messaging channel did not accept a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct DeliveryError(pub String);

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("seen-item store backend error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("seen-item store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything that can go wrong inside one poll cycle. None of these escape the cycle.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("authentication error: {0}")]
    Auth(String),

    #[error("marketplace still failing after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: ApiError },

    #[error("data error: {0}")]
    Data(String),

    #[error("failed to notify listing {listing_id}: {source}")]
    Delivery {
        listing_id: String,
        #[source]
        source: DeliveryError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cycle cancelled by shutdown")]
    Cancelled,
}

impl CycleError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_display_includes_status() {
        let err = ApiError::transient(Some(503), "service unavailable");
        assert_eq!(
            err.to_string(),
            "transient API failure (HTTP 503): service unavailable"
        );

        let err = ApiError::transient(None, "timed out");
        assert_eq!(err.to_string(), "transient API failure: timed out");
    }

    #[test]
    fn test_only_auth_errors_count_for_escalation() {
        assert!(CycleError::Auth("invalid_grant".into()).is_auth());
        assert!(!CycleError::Data("bad json".into()).is_auth());
        assert!(!CycleError::Cancelled.is_auth());
    }
}
