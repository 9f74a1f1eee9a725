pub mod auth;
pub mod ebay;
pub mod types;

pub use auth::{Credential, CredentialManager};
pub use ebay::{EbayClient, MarketplaceClient};
pub use types::*;

use std::time::Duration;

/// Shared HTTP client; every outbound call carries the same request timeout.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("ebay-listing-watcher/", env!("CARGO_PKG_VERSION")))
        .build()
}
