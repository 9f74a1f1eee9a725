//! Watches an eBay saved search and posts each new listing to a Telegram chat.
//!
//! The worker role runs [`scanner::Scheduler`] over a [`scanner::PollCycle`]; the web
//! role only answers liveness checks.

pub mod api;
pub mod core;
pub mod notify;
pub mod scanner;
pub mod store;
