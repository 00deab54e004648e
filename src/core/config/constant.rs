use crate::base::ResourceType;

// default app settings
pub const RUNTIME_VERSION: &str = "v1";
pub const DEFAULT_APP_NAME: &str = "unknown_service";
pub const DEFAULT_APP_TYPE: u8 = ResourceType::Common as _;
pub const APP_NAME_ENV_KEY: &str = "FLOWGUARD_APP_NAME";
pub const APP_TYPE_ENV_KEY: &str = "FLOWGUARD_APP_TYPE";
pub const CONF_FILE_PATH_ENV_KEY: &str = "FLOWGUARD_CONFIG_FILE_PATH";
pub const CONFIG_FILENAME: &str = "USE_DEFAULT_CONFIGURATION";

// default log settings
pub const DEFAULT_LOG_LEVEL: &str = "warn";

// traffic shaping defaults
pub const WARM_UP_COLD_FACTOR: u32 = 3;

// degrade defaults
pub const DEGRADE_DEFAULT_SLOW_REQUEST_AMOUNT: u32 = 5;
pub const DEGRADE_DEFAULT_MIN_REQUEST_AMOUNT: u64 = 5;

// parameter flow defaults
pub const CONCURRENCY_MAX_COUNT: usize = 4000;
pub const PARAMS_CAPACITY_BASE: usize = 4000;
pub const PARAMS_MAX_CAPACITY: usize = 20000;

// cluster defaults
pub const DEFAULT_EXCEED_COUNT: f64 = 1.0;
pub const DEFAULT_MAX_OCCUPY_RATIO: f64 = 1.0;
pub const DEFAULT_NAMESPACE_MAX_QPS: f64 = 30000.0;
