use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use super::error::ConfigError;

pub const DEFAULT_EBAY_API_URL: &str = "https://api.ebay.com";
pub const DEFAULT_EBAY_TOKEN_URL: &str = "https://api.ebay.com/identity/v1/oauth2/token";
pub const DEFAULT_EBAY_SCOPE: &str = "https://api.ebay.com/oauth/api_scope";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Keeps `now - retention` well inside chrono's representable range.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ebay: EbayConfig,
    pub telegram: TelegramConfig,
    pub search: SearchConfig,
    pub worker: WorkerConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EbayConfig {
    pub app_id: String,
    pub cert_id: String,
    pub dev_id: Option<String>,
    pub refresh_token: String,
    pub api_url: String,
    pub token_url: String,
    pub marketplace_id: String,
    pub oauth_scope: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub keywords: String,
    pub filters: BTreeMap<String, String>,
    pub max_pages: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub poll_interval_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub token_safety_margin_secs: i64,
    pub retention_days: i64,
    pub auth_escalation_threshold: u32,
    pub seed_existing: bool,
    pub startup_summary: bool,
    pub database_path: String,
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub port: u16,
    pub log_level: String,
}

impl Config {
    /// Full worker configuration. Loads `.env` first when one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key: &str| env::var(key).ok())
    }

    /// The web role only needs a port and a log level.
    pub fn web_from_env() -> Result<MonitoringConfig, ConfigError> {
        dotenv::dotenv().ok();
        monitoring_from(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let refresh_token = optional(&lookup, "EBAY_REFRESH_TOKEN")
            .or_else(|| optional(&lookup, "EBAY_AUTH_TOKEN"))
            .ok_or(ConfigError::Missing("EBAY_REFRESH_TOKEN"))?;

        let search = SearchConfig {
            keywords: required(&lookup, "SEARCH_KEYWORDS")?,
            filters: match optional(&lookup, "SEARCH_FILTERS") {
                Some(raw) => parse_filters(&raw)?,
                None => BTreeMap::new(),
            },
            max_pages: parsed(&lookup, "SEARCH_MAX_PAGES", 2)?,
            page_size: parsed(&lookup, "SEARCH_PAGE_SIZE", 50)?,
        };
        if search.max_pages == 0 || search.page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "SEARCH_MAX_PAGES",
                reason: "page count and page size must be positive".to_string(),
            });
        }

        let worker = WorkerConfig {
            poll_interval_secs: parsed(&lookup, "POLL_INTERVAL", 300)?,
            retry_attempts: parsed(&lookup, "RETRY_ATTEMPTS", 3)?,
            retry_base_delay_secs: parsed(&lookup, "RETRY_BASE_DELAY_SECS", 2)?,
            request_timeout_secs: parsed(&lookup, "REQUEST_TIMEOUT_SECS", 15)?,
            token_safety_margin_secs: parsed(&lookup, "TOKEN_SAFETY_MARGIN_SECS", 60)?,
            retention_days: parsed(&lookup, "RETENTION_DAYS", 30)?,
            auth_escalation_threshold: parsed(&lookup, "AUTH_ESCALATION_THRESHOLD", 5)?,
            seed_existing: parsed(&lookup, "SEED_EXISTING", false)?,
            startup_summary: parsed(&lookup, "STARTUP_SUMMARY", true)?,
            database_path: optional(&lookup, "DATABASE_PATH")
                .unwrap_or_else(|| "data/seen_items.db".to_string()),
        };
        if worker.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "POLL_INTERVAL",
                reason: "must be at least one second".to_string(),
            });
        }
        if worker.retry_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "RETRY_ATTEMPTS",
                reason: "at least one attempt is required".to_string(),
            });
        }
        if !(1..=MAX_RETENTION_DAYS).contains(&worker.retention_days) {
            return Err(ConfigError::Invalid {
                name: "RETENTION_DAYS",
                reason: format!("must be between 1 and {MAX_RETENTION_DAYS}"),
            });
        }
        if worker.token_safety_margin_secs < 0 {
            return Err(ConfigError::Invalid {
                name: "TOKEN_SAFETY_MARGIN_SECS",
                reason: "must not be negative".to_string(),
            });
        }

        Ok(Config {
            ebay: EbayConfig {
                app_id: required(&lookup, "EBAY_APP_ID")?,
                cert_id: required(&lookup, "EBAY_CERT_ID")?,
                dev_id: optional(&lookup, "EBAY_DEV_ID"),
                refresh_token,
                api_url: optional(&lookup, "EBAY_API_URL")
                    .unwrap_or_else(|| DEFAULT_EBAY_API_URL.to_string()),
                token_url: optional(&lookup, "EBAY_TOKEN_URL")
                    .unwrap_or_else(|| DEFAULT_EBAY_TOKEN_URL.to_string()),
                marketplace_id: optional(&lookup, "EBAY_MARKETPLACE_ID")
                    .unwrap_or_else(|| "EBAY_US".to_string()),
                oauth_scope: optional(&lookup, "EBAY_OAUTH_SCOPE")
                    .unwrap_or_else(|| DEFAULT_EBAY_SCOPE.to_string()),
            },
            telegram: TelegramConfig {
                bot_token: required(&lookup, "TELEGRAM_TOKEN")?,
                chat_id: required(&lookup, "TELEGRAM_CHAT_ID")?,
                api_url: optional(&lookup, "TELEGRAM_API_URL")
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            },
            search,
            worker,
            monitoring: monitoring_from(&lookup)?,
        })
    }
}

fn monitoring_from<F>(lookup: &F) -> Result<MonitoringConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(MonitoringConfig {
        port: parsed(lookup, "PORT", 5000)?,
        log_level: optional(lookup, "LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
    })
}

fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, name).ok_or(ConfigError::Missing(name))
}

fn parsed<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

/// Parses `name:value;name:value` into browse filters. The value keeps any further colons,
/// so `price:[10..200]` and `priceCurrency:USD` both survive intact.
pub fn parse_filters(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut filters = BTreeMap::new();
    for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, value) = part.split_once(':').ok_or_else(|| ConfigError::Invalid {
            name: "SEARCH_FILTERS",
            reason: format!("{part:?} is not in name:value form"),
        })?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return Err(ConfigError::Invalid {
                name: "SEARCH_FILTERS",
                reason: format!("{part:?} has an empty name or value"),
            });
        }
        filters.insert(name.to_string(), value.to_string());
    }
    Ok(filters)
}
