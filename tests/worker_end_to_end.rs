//! Full worker stack against mocked eBay and Telegram endpoints.

use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ebay_listing_watcher::api::{CredentialManager, EbayClient, SearchCriteria};
use ebay_listing_watcher::core::config::{EbayConfig, SearchConfig, TelegramConfig};
use ebay_listing_watcher::notify::TelegramNotifier;
use ebay_listing_watcher::scanner::{CycleCounts, PollCycle};
use ebay_listing_watcher::store::SqliteSeenStore;

fn item(id: &str) -> serde_json::Value {
    json!({
        "itemId": id,
        "title": format!("Vintage camera {id}"),
        "price": {"value": "42.00", "currency": "USD"},
        "itemWebUrl": format!("https://www.ebay.com/itm/{id}")
    })
}

async fn mount_search(server: &MockServer, ids: &[&str], priority: u8) {
    let items: Vec<_> = ids.iter().map(|id| item(id)).collect();
    Mock::given(method("GET"))
        .and(path("/buy/browse/v1/item_summary/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": items.len(),
            "itemSummaries": items
        })))
        .up_to_n_times(1)
        .with_priority(priority)
        .mount(server)
        .await;
}

#[tokio::test]
async fn two_cycles_notify_each_listing_once() {
    let ebay_server = MockServer::start().await;
    let telegram_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/identity/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&ebay_server)
        .await;
    mount_search(&ebay_server, &["A", "B"], 1).await;
    mount_search(&ebay_server, &["A", "B", "C"], 2).await;

    Mock::given(method("POST"))
        .and(path("/bottest-token/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(3)
        .mount(&telegram_server)
        .await;

    let ebay = EbayConfig {
        app_id: "app".to_string(),
        cert_id: "cert".to_string(),
        dev_id: None,
        refresh_token: "refresh".to_string(),
        api_url: ebay_server.uri(),
        token_url: format!("{}/identity/v1/oauth2/token", ebay_server.uri()),
        marketplace_id: "EBAY_US".to_string(),
        oauth_scope: "scope".to_string(),
    };
    let search = SearchConfig {
        keywords: "vintage camera".to_string(),
        filters: Default::default(),
        max_pages: 1,
        page_size: 50,
    };
    let telegram = TelegramConfig {
        bot_token: "test-token".to_string(),
        chat_id: "42".to_string(),
        api_url: telegram_server.uri(),
    };

    let http = reqwest::Client::new();
    let credentials = CredentialManager::new(http.clone(), &ebay, 60);
    let client = EbayClient::new(http.clone(), credentials, &ebay, &search);
    let notifier = Arc::new(TelegramNotifier::new(http, &telegram));
    let store = Arc::new(SqliteSeenStore::in_memory().await.unwrap());

    let mut cycle = PollCycle::new(
        Box::new(client),
        store,
        notifier,
        SearchCriteria::from(&search),
    );
    let (_tx, rx) = watch::channel(false);

    let first = cycle.run(&rx).await;
    assert_eq!(
        first.counts,
        CycleCounts {
            fetched: 2,
            new: 2,
            notified: 2,
            failed: 0,
        }
    );

    let second = cycle.run(&rx).await;
    assert_eq!(
        second.counts,
        CycleCounts {
            fetched: 3,
            new: 1,
            notified: 1,
            failed: 0,
        }
    );

    let sent = telegram_server.received_requests().await.unwrap();
    let last: serde_json::Value = serde_json::from_slice(&sent[2].body).unwrap();
    assert!(last["text"].as_str().unwrap().contains("Vintage camera C"));
}
