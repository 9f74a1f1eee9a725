pub mod config;
pub mod error;
pub mod health;
pub mod logging;

pub use config::Config;
pub use error::{ApiError, ConfigError, CycleError, DeliveryError, StoreError};
pub use health::HealthChecker;
