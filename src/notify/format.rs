//! Message text for the chat channel. Plain text only, so nothing needs escaping.

use chrono::{DateTime, Utc};

use crate::api::{Listing, SearchCriteria};

const MAX_TITLE_CHARS: usize = 200;
const SUMMARY_LISTINGS: usize = 10;

pub fn format_listing_message(listing: &Listing) -> String {
    let seen = listing
        .first_seen_at
        .map(format_time)
        .unwrap_or_else(|| "just now".to_string());

    format!(
        "🆕 New eBay listing\n\
        \n\
        🏷 {}\n\
        💰 {}\n\
        ⏰ First seen: {}\n\
        🔗 {}",
        truncate(&listing.title, MAX_TITLE_CHARS),
        listing.price,
        seen,
        listing.url
    )
}

pub fn format_startup_message(
    criteria: &SearchCriteria,
    interval_secs: u64,
    started_at: DateTime<Utc>,
) -> String {
    let filters = criteria
        .filter_param()
        .unwrap_or_else(|| "none".to_string());

    format!(
        "🟢 eBay Listing Watcher started!\n\
        • Search: {}\n\
        • Filters: {}\n\
        • Monitoring started at: {}\n\
        • Checking every {}",
        criteria.keywords,
        filters,
        format_time(started_at),
        format_interval(interval_secs)
    )
}

/// What the saved search currently matches, sent once after the first successful fetch.
pub fn format_inventory_summary(criteria: &SearchCriteria, listings: &[Listing]) -> String {
    let mut text = format!(
        "📋 Current listings for \"{}\" ({} items)",
        criteria.keywords,
        listings.len()
    );
    if listings.is_empty() {
        text.push_str("\n\nNothing matches right now.");
        return text;
    }

    for listing in listings.iter().take(SUMMARY_LISTINGS) {
        text.push_str(&format!(
            "\n\n🏷 {}\n💰 {}\n🔗 {}",
            truncate(&listing.title, MAX_TITLE_CHARS),
            listing.price,
            listing.url
        ));
    }
    if listings.len() > SUMMARY_LISTINGS {
        text.push_str(&format!(
            "\n\n➕ {} more items not shown",
            listings.len() - SUMMARY_LISTINGS
        ));
    }
    text
}

pub fn format_auth_escalation(consecutive_failures: u32, last_error: &str) -> String {
    format!(
        "🚨 eBay authentication has failed for {} consecutive cycles.\n\
        No new listings can be reported until the refresh token is renewed.\n\
        Last error: {}",
        consecutive_failures, last_error
    )
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_interval(secs: u64) -> String {
    match secs {
        s if s % 60 == 0 && s >= 60 => {
            let minutes = s / 60;
            format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
        }
        s => format!("{} seconds", s),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars - 1).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Price;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn listing(title: &str) -> Listing {
        Listing {
            id: "123".to_string(),
            title: title.to_string(),
            price: Price {
                amount: Decimal::new(4999, 2),
                currency: "USD".to_string(),
            },
            url: "https://www.ebay.com/itm/123".to_string(),
            first_seen_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap()),
        }
    }

    #[test]
    fn test_listing_message_has_title_price_link() {
        let text = format_listing_message(&listing("Canon AE-1 Program"));
        assert!(text.contains("🏷 Canon AE-1 Program"));
        assert!(text.contains("💰 49.99 USD"));
        assert!(text.contains("⏰ First seen: 2026-03-01 12:30:00 UTC"));
        assert!(text.ends_with("🔗 https://www.ebay.com/itm/123"));
    }

    #[test]
    fn test_long_titles_truncated_on_char_boundary() {
        let title = "\u{e9}".repeat(300);
        let text = format_listing_message(&listing(&title));
        let line = text.lines().find(|l| l.contains('\u{e9}')).unwrap();
        assert_eq!(line.matches('\u{e9}').count(), MAX_TITLE_CHARS - 1);
        assert!(line.ends_with('…'));
    }

    #[test]
    fn test_startup_message() {
        let criteria = SearchCriteria::new("vintage camera").with_filter("price", "[10..200]");
        let started = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let text = format_startup_message(&criteria, 300, started);
        assert!(text.contains("Search: vintage camera"));
        assert!(text.contains("Filters: price:[10..200]"));
        assert!(text.contains("Checking every 5 minutes"));

        let text = format_startup_message(&SearchCriteria::new("x"), 90, started);
        assert!(text.contains("Filters: none"));
        assert!(text.contains("Checking every 90 seconds"));
    }

    #[test]
    fn test_inventory_summary_lists_first_ten() {
        let criteria = SearchCriteria::new("vintage camera");
        let listings: Vec<Listing> = (1..=13)
            .map(|n| {
                let mut l = listing(&format!("Camera #{n}"));
                l.id = n.to_string();
                l
            })
            .collect();

        let text = format_inventory_summary(&criteria, &listings);
        assert!(text.starts_with("📋 Current listings for \"vintage camera\" (13 items)"));
        assert_eq!(text.matches("🏷 ").count(), 10);
        assert!(text.contains("🏷 Camera #10\n"));
        assert!(!text.contains("Camera #11"));
        assert!(text.ends_with("➕ 3 more items not shown"));
    }

    #[test]
    fn test_inventory_summary_small_and_empty() {
        let criteria = SearchCriteria::new("vintage camera");
        let text = format_inventory_summary(&criteria, &[listing("Pentax K1000")]);
        assert!(text.contains("(1 items)"));
        assert!(text.contains("🏷 Pentax K1000"));
        assert!(!text.contains("more items not shown"));

        let text = format_inventory_summary(&criteria, &[]);
        assert!(text.ends_with("Nothing matches right now."));
    }

    #[test]
    fn test_interval_wording() {
        assert_eq!(format_interval(60), "1 minute");
        assert_eq!(format_interval(900), "15 minutes");
        assert_eq!(format_interval(45), "45 seconds");
    }
}
