//! Adapters for the `log` facade.

use cfg_if::cfg_if;
use lazy_static::lazy_static;
pub use log::{debug, error, info, trace, warn};
use std::sync::Once;

lazy_static! {
    /// Throttles error logs on hot paths so a misconfiguration does not flood the sink.
    pub static ref FREQUENT_ERROR_ONCE: Once = Once::new();
}

cfg_if! {
    if #[cfg(feature = "logger_env")] {
        use crate::config::DEFAULT_LOG_LEVEL;
        pub fn logger_init(_: Option<String>) {
            env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or(DEFAULT_LOG_LEVEL),
            )
            .try_init()
            .ok();
        }
    } else {
        pub fn logger_init(_: Option<String>) {}
    }
}
