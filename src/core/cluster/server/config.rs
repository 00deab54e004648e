use crate::config::{DEFAULT_EXCEED_COUNT, DEFAULT_MAX_OCCUPY_RATIO, DEFAULT_NAMESPACE_MAX_QPS};
use lazy_static::lazy_static;
use std::sync::RwLock;

/// Tunables of the embedded token server.
#[derive(Debug, Clone)]
pub struct ServerFlowConfig {
    /// multiplier applied to the computed global threshold
    pub exceed_count: f64,
    /// cap on pending occupations, as a ratio of the global threshold
    pub max_occupy_ratio: f64,
    /// namespace-level request limit (QPS)
    pub namespace_max_allowed_qps: f64,
}

impl Default for ServerFlowConfig {
    fn default() -> Self {
        ServerFlowConfig {
            exceed_count: DEFAULT_EXCEED_COUNT,
            max_occupy_ratio: DEFAULT_MAX_OCCUPY_RATIO,
            namespace_max_allowed_qps: DEFAULT_NAMESPACE_MAX_QPS,
        }
    }
}

lazy_static! {
    static ref SERVER_CONFIG: RwLock<ServerFlowConfig> = RwLock::new(ServerFlowConfig::default());
}

pub fn update_server_flow_config(config: ServerFlowConfig) {
    *SERVER_CONFIG.write().unwrap() = config;
}

pub fn exceed_count() -> f64 {
    SERVER_CONFIG.read().unwrap().exceed_count
}

pub fn max_occupy_ratio() -> f64 {
    SERVER_CONFIG.read().unwrap().max_occupy_ratio
}

pub fn namespace_max_allowed_qps() -> f64 {
    SERVER_CONFIG.read().unwrap().namespace_max_allowed_qps
}
