use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::env;
use std::sync::Arc;
use tokio::sync::watch;

use ebay_listing_watcher::api::{self, CredentialManager, EbayClient, SearchCriteria};
use ebay_listing_watcher::core::{health, logging, Config, HealthChecker};
use ebay_listing_watcher::notify::{format::format_startup_message, Notifier, TelegramNotifier};
use ebay_listing_watcher::scanner::{PollCycle, Scheduler};
use ebay_listing_watcher::store::SqliteSeenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Web,
    Worker,
}

impl Role {
    /// CLI argument first, then `PROCESS_ROLE`, defaulting to the worker.
    fn resolve() -> Result<Self> {
        let requested = env::args()
            .nth(1)
            .or_else(|| env::var("PROCESS_ROLE").ok())
            .unwrap_or_else(|| "worker".to_string());

        match requested.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Role::Web),
            "worker" => Ok(Role::Worker),
            other => bail!("unknown process role {other:?} (expected \"web\" or \"worker\")"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    match Role::resolve()? {
        Role::Web => run_web().await,
        Role::Worker => run_worker().await,
    }
}

async fn run_web() -> Result<()> {
    let monitoring = Config::web_from_env().context("loading web configuration")?;
    logging::init_logging(&monitoring.log_level);

    tracing::info!("🌐 eBay Listing Watcher web role starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let checker = Arc::new(HealthChecker::new("web"));
    health::start_health_server(checker, monitoring.port).await;
    Ok(())
}

async fn run_worker() -> Result<()> {
    let config = Config::from_env().context("loading worker configuration")?;
    logging::init_logging(&config.monitoring.log_level);

    tracing::info!("🚀 eBay Listing Watcher worker starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Search: {:?} (marketplace {}, every {}s)",
        config.search.keywords,
        config.ebay.marketplace_id,
        config.worker.poll_interval_secs
    );

    let http = api::http_client(config.worker.request_timeout()).context("building HTTP client")?;

    let store = Arc::new(
        SqliteSeenStore::new(&config.worker.database_path)
            .await
            .with_context(|| {
                format!("opening seen-item store at {}", config.worker.database_path)
            })?,
    );

    let credentials = CredentialManager::new(
        http.clone(),
        &config.ebay,
        config.worker.token_safety_margin_secs,
    );
    let client = EbayClient::new(http.clone(), credentials, &config.ebay, &config.search);
    let notifier = Arc::new(TelegramNotifier::new(http, &config.telegram));
    let criteria = SearchCriteria::from(&config.search);

    let banner = format_startup_message(&criteria, config.worker.poll_interval_secs, Utc::now());
    if let Err(e) = notifier.send_text(&banner).await {
        tracing::warn!("Startup message not delivered: {}", e);
    }

    let mut cycle = PollCycle::new(Box::new(client), store, notifier, criteria)
        .with_worker_config(&config.worker);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("🛑 Shutdown signal received, finishing current cycle");
        shutdown_tx.send_replace(true);
    });

    Scheduler::new(config.worker.poll_interval())
        .run(&mut cycle, shutdown_rx)
        .await;

    tracing::info!("👋 Worker stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
