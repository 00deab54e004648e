use super::constant::*;
use crate::base::{
    check_validity_for_statistic, ResourceType, DEFAULT_INTERVAL_MS, DEFAULT_INTERVAL_MS_MINUTE,
    DEFAULT_OCCUPY_TIMEOUT_MS, DEFAULT_SAMPLE_COUNT, DEFAULT_SAMPLE_COUNT_MINUTE,
    DEFAULT_STATISTIC_MAX_RT,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// app_name represents the name of the running service.
    pub app_name: String,
    /// app_type indicates the resource type of the service (e.g. web service, API gateway).
    pub app_type: ResourceType,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            app_name: DEFAULT_APP_NAME.into(),
            app_type: DEFAULT_APP_TYPE.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LogConfig {
    /// configuration file handed to the logger adapter, when it needs one
    pub config_file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            config_file: String::new(),
        }
    }
}

/// Statistic window parameters. The second-level window drives the QPS
/// decisions, the minute-level window the totals.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StatConfig {
    pub second_sample_count: u32,
    pub second_interval_ms: u32,
    pub minute_sample_count: u32,
    pub minute_interval_ms: u32,
    /// upper clamp applied to every recorded round trip (ms)
    pub statistic_max_rt: u64,
    /// horizon a prioritized request may pre-occupy (ms)
    pub occupy_timeout_ms: u64,
}

impl Default for StatConfig {
    fn default() -> Self {
        StatConfig {
            second_sample_count: DEFAULT_SAMPLE_COUNT,
            second_interval_ms: DEFAULT_INTERVAL_MS,
            minute_sample_count: DEFAULT_SAMPLE_COUNT_MINUTE,
            minute_interval_ms: DEFAULT_INTERVAL_MS_MINUTE,
            statistic_max_rt: DEFAULT_STATISTIC_MAX_RT,
            occupy_timeout_ms: DEFAULT_OCCUPY_TIMEOUT_MS,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    pub app: AppConfig,
    pub log: LogConfig,
    pub stat: StatConfig,
    /// whether to serve timestamps from the cached-time ticker
    pub use_cache_time: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            app: AppConfig::default(),
            log: LogConfig::default(),
            stat: StatConfig::default(),
            use_cache_time: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ConfigEntity {
    pub version: String,
    pub config: RuntimeConfig,
}

impl ConfigEntity {
    pub fn new() -> Self {
        ConfigEntity {
            version: RUNTIME_VERSION.into(),
            config: RuntimeConfig::default(),
        }
    }

    pub fn check(&self) -> Result<()> {
        check_validity_for_statistic(
            self.config.stat.second_sample_count,
            self.config.stat.second_interval_ms,
            "invalid second-level statistic parameters",
        )?;
        check_validity_for_statistic(
            self.config.stat.minute_sample_count,
            self.config.stat.minute_interval_ms,
            "invalid minute-level statistic parameters",
        )?;
        Ok(())
    }
}

impl fmt::Display for ConfigEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}
