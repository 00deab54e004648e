/// Resource name of the process-wide inbound traffic aggregation.
pub const TOTAL_INBOUND_RESOURCE_NAME: &str = "__total_inbound_traffic__";

/// Name used for contexts created implicitly by `EntryBuilder` when the caller
/// did not enter one.
pub const DEFAULT_CONTEXT_NAME: &str = "default_context";

/// `limit_app` value matching every origin.
pub const LIMIT_APP_DEFAULT: &str = "default";
/// `limit_app` value matching origins no other rule of the resource names.
pub const LIMIT_APP_OTHER: &str = "other";

pub const DEFAULT_MAX_RESOURCE_AMOUNT: usize = 10000;

// second-level statistic window: 2 buckets of 500 ms
pub const DEFAULT_SAMPLE_COUNT: u32 = 2;
pub const DEFAULT_INTERVAL_MS: u32 = 1000;

// minute-level statistic window: 60 buckets of 1 s
pub const DEFAULT_SAMPLE_COUNT_MINUTE: u32 = 60;
pub const DEFAULT_INTERVAL_MS_MINUTE: u32 = 60000;

/// Upper clamp for a recorded round trip (ms).
pub const DEFAULT_STATISTIC_MAX_RT: u64 = 60000;

/// Max future wait a prioritized request may pre-occupy (ms).
pub const DEFAULT_OCCUPY_TIMEOUT_MS: u64 = 500;

pub const SLOT_INIT: usize = 8;
