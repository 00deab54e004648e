//! Metric line codec
//!
//! One `MetricItem` corresponds to one second of aggregated statistics of a
//! single resource, rendered as a `|`-separated log line.

use super::{ResourceType, TimePredicate};
use crate::utils::format_time_millis;
use crate::{Error, Result};
use std::fmt;

pub const METRIC_PART_SEPARATOR: &str = "|";
pub const METRIC_EMPTY_STRING_ERROR: &str = "invalid metric line: empty string";
pub const METRIC_INVALID_FORMAT_ERROR: &str = "invalid metric line: invalid format";

#[derive(Debug, Clone, Default)]
pub struct MetricItem {
    pub resource: String,
    pub resource_type: ResourceType,
    pub timestamp: u64,
    pub pass_qps: u64,
    pub block_qps: u64,
    pub success_qps: u64,
    pub error_qps: u64,
    pub avg_rt: u64,
    pub occupied_pass_qps: u64,
    pub concurrency: u32,
}

impl fmt::Display for MetricItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time_str = format_time_millis(self.timestamp);
        let final_name = self.resource.replace(METRIC_PART_SEPARATOR, "_");
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.timestamp,
            time_str,
            final_name,
            self.pass_qps,
            self.block_qps,
            self.success_qps,
            self.error_qps,
            self.avg_rt,
            self.occupied_pass_qps,
            self.concurrency,
            self.resource_type as u8
        )
    }
}

impl MetricItem {
    /// cannot use the `FromStr` trait alias here, since conversion may fail
    pub fn from_string(line: &str) -> Result<Self> {
        if line.is_empty() {
            return Err(Error::msg(METRIC_EMPTY_STRING_ERROR));
        }
        let arr: Vec<&str> = line.split(METRIC_PART_SEPARATOR).collect();
        if arr.len() < 8 {
            return Err(Error::msg(METRIC_INVALID_FORMAT_ERROR));
        }
        let mut item = MetricItem {
            timestamp: arr[0].parse::<u64>()?,
            resource: arr[2].into(),
            pass_qps: arr[3].parse::<u64>()?,
            block_qps: arr[4].parse::<u64>()?,
            success_qps: arr[5].parse::<u64>()?,
            error_qps: arr[6].parse::<u64>()?,
            avg_rt: arr[7].parse::<u64>()?,
            ..Default::default()
        };
        if arr.len() >= 9 {
            item.occupied_pass_qps = arr[8].parse::<u64>()?;
            if arr.len() >= 10 {
                item.concurrency = arr[9].parse::<u32>()?;
                if arr.len() >= 11 {
                    item.resource_type = arr[10].parse::<u8>()?.into();
                }
            }
        }
        Ok(item)
    }
}

pub trait MetricItemRetriever: Send + Sync {
    fn metrics_on_condition(&self, predicate: &TimePredicate) -> Vec<MetricItem>;
}
