use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::config::SearchConfig;

/// The single saved search a deployment watches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub keywords: String,
    pub filters: BTreeMap<String, String>,
}

impl SearchCriteria {
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    /// Browse API `filter` parameter: `name:value,name:value`.
    pub fn filter_param(&self) -> Option<String> {
        if self.filters.is_empty() {
            return None;
        }
        Some(
            self.filters
                .iter()
                .map(|(name, value)| format!("{name}:{value}"))
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

impl From<&SearchConfig> for SearchCriteria {
    fn from(config: &SearchConfig) -> Self {
        Self {
            keywords: config.keywords.clone(),
            filters: config.filters.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount: Decimal,
    pub currency: String,
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: Price,
    pub url: String,
    /// Local time the listing was first notified. Unset until the poll cycle stamps it.
    pub first_seen_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Copy of this listing carrying the local first-seen time.
    pub fn seen_at(&self, at: DateTime<Utc>) -> Listing {
        Listing {
            first_seen_at: Some(at),
            ..self.clone()
        }
    }
}

// ---- eBay wire types ----

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub item_summaries: Vec<ItemSummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub item_id: Option<String>,
    pub title: Option<String>,
    pub price: Option<ItemPrice>,
    pub item_web_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemPrice {
    pub value: String,
    pub currency: String,
}

impl ItemSummary {
    /// Maps one result row. A row missing any field we report on is a shape error.
    pub fn into_listing(self) -> Result<Listing, String> {
        let id = self.item_id.filter(|s| !s.is_empty()).ok_or("item without itemId")?;
        let title = self
            .title
            .ok_or_else(|| format!("item {id} has no title"))?;
        let url = self
            .item_web_url
            .ok_or_else(|| format!("item {id} has no itemWebUrl"))?;
        let price = self.price.ok_or_else(|| format!("item {id} has no price"))?;
        let amount = price
            .value
            .parse::<Decimal>()
            .map_err(|e| format!("item {id} has unparsable price {:?}: {e}", price.value))?;

        Ok(Listing {
            id,
            title,
            price: Price {
                amount,
                currency: price.currency,
            },
            url,
            first_seen_at: None,
        })
    }
}
