use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashSet;

use super::auth::CredentialManager;
use super::types::{Listing, SearchCriteria, SearchPage};
use crate::core::config::{EbayConfig, SearchConfig};
use crate::core::error::ApiError;

const SEARCH_PATH: &str = "/buy/browse/v1/item_summary/search";

/// Source of listings for a saved search. Stateless per call apart from the token cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// All result rows for `criteria`, in marketplace order.
    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<Listing>, ApiError>;
}

/// One HTTP exchange, tagged by what the caller has to do next.
#[derive(Debug)]
enum PageOutcome {
    Page(SearchPage),
    Unauthorized(StatusCode),
    Failed(ApiError),
}

pub struct EbayClient {
    client: Client,
    credentials: CredentialManager,
    base_url: String,
    marketplace_id: String,
    page_size: u32,
    max_pages: u32,
}

impl EbayClient {
    pub fn new(
        client: Client,
        credentials: CredentialManager,
        ebay: &EbayConfig,
        search: &SearchConfig,
    ) -> Self {
        Self {
            client,
            credentials,
            base_url: ebay.api_url.trim_end_matches('/').to_string(),
            marketplace_id: ebay.marketplace_id.clone(),
            page_size: search.page_size,
            max_pages: search.max_pages,
        }
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    async fn fetch_page(&self, token: &str, criteria: &SearchCriteria, offset: u32) -> PageOutcome {
        let url = format!("{}{}", self.base_url, SEARCH_PATH);

        let mut query: Vec<(&str, String)> = vec![
            ("q", criteria.keywords.clone()),
            ("sort", "newlyListed".to_string()),
            ("limit", self.page_size.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(filter) = criteria.filter_param() {
            query.push(("filter", filter));
        }

        let response = match self
            .client
            .get(&url)
            .bearer_auth(token)
            .header("X-EBAY-C-MARKETPLACE-ID", &self.marketplace_id)
            .query(&query)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return PageOutcome::Failed(e.into()),
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return PageOutcome::Unauthorized(status);
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("eBay search throttled or failing: {} - {}", status, body);
            return PageOutcome::Failed(ApiError::transient(Some(status.as_u16()), body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("eBay search rejected: {} - {}", status, body);
            return PageOutcome::Failed(ApiError::Data(format!("HTTP {status}: {body}")));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return PageOutcome::Failed(e.into()),
        };
        match serde_json::from_str::<SearchPage>(&body) {
            Ok(page) => PageOutcome::Page(page),
            Err(e) => PageOutcome::Failed(ApiError::Data(format!("search response: {e}"))),
        }
    }

    /// Fetches one page; a 401/403 invalidates the token and the request is retried exactly once.
    async fn fetch_page_authorized(
        &mut self,
        criteria: &SearchCriteria,
        offset: u32,
    ) -> Result<SearchPage, ApiError> {
        let token = self.credentials.get_valid_token().await?;
        match self.fetch_page(&token, criteria, offset).await {
            PageOutcome::Page(page) => return Ok(page),
            PageOutcome::Failed(err) => return Err(err),
            PageOutcome::Unauthorized(status) => {
                tracing::warn!("🔑 eBay answered {} - forcing token refresh", status);
                self.credentials.invalidate();
            }
        }

        let token = self.credentials.get_valid_token().await?;
        match self.fetch_page(&token, criteria, offset).await {
            PageOutcome::Page(page) => Ok(page),
            PageOutcome::Failed(err) => Err(err),
            PageOutcome::Unauthorized(status) => Err(ApiError::Auth(format!(
                "search still answered {status} after token refresh"
            ))),
        }
    }
}

#[async_trait]
impl MarketplaceClient for EbayClient {
    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<Listing>, ApiError> {
        let mut listings = Vec::new();
        let mut ids = HashSet::new();
        let mut offset = 0;

        for page_number in 0..self.max_pages {
            let page = self.fetch_page_authorized(criteria, offset).await?;
            let row_count = page.item_summaries.len();
            tracing::debug!(
                page = page_number,
                rows = row_count,
                total = ?page.total,
                "eBay search page fetched"
            );

            for item in page.item_summaries {
                let listing = item.into_listing().map_err(ApiError::Data)?;
                // a listing can slide across a page boundary between requests
                if ids.insert(listing.id.clone()) {
                    listings.push(listing);
                }
            }

            if page.next.is_none() || row_count < self.page_size as usize {
                break;
            }
            offset += self.page_size;
        }

        Ok(listings)
    }
}
