pub mod format;
pub mod telegram;

pub use telegram::TelegramNotifier;

use async_trait::async_trait;

use crate::api::Listing;
use crate::core::error::DeliveryError;

/// Outbound messaging channel. Implementations must not retry internally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends exactly one message describing `listing`.
    async fn notify(&self, listing: &Listing) -> Result<(), DeliveryError>;

    /// Operational text (startup banner, escalation alerts).
    async fn send_text(&self, text: &str) -> Result<(), DeliveryError>;
}
