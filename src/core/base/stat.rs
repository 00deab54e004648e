//! Statistic primitives shared across the runtime.

use crate::{Error, Result};
use enum_map::Enum;
use std::fmt;
use std::sync::Arc;

pub type TimePredicate = dyn Fn(u64) -> bool;

/// Counter kinds recorded per statistic bucket.
/// `Pass + Block` equals the total of admitted enter attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
pub enum MetricEvent {
    /// rule checks passed
    Pass,
    /// rule checks rejected
    Block,
    /// completed without a business error
    Success,
    /// business error, feeds circuit breaking
    Error,
    /// accumulated round trip, unit is millisecond
    Rt,
    /// passes pre-occupied by prioritized requests
    OccupiedPass,
}

/// `Node` holds real-time statistics of one resource in one scope
/// (per invocation chain, per resource, or per origin).
pub trait Node: Send + Sync + fmt::Debug {
    // derived values over the second-level window
    fn pass_qps(&self) -> f64;
    fn block_qps(&self) -> f64;
    fn total_qps(&self) -> f64 {
        self.pass_qps() + self.block_qps()
    }
    fn success_qps(&self) -> f64;
    fn exception_qps(&self) -> f64;
    fn occupied_pass_qps(&self) -> f64;
    /// pass count of the previous second, read from the minute window
    fn previous_pass_qps(&self) -> f64;
    fn max_success_qps(&self) -> f64;
    fn avg_rt(&self) -> f64;
    fn min_rt(&self) -> f64;
    fn cur_thread_num(&self) -> u32;

    // totals over the minute window
    fn total_request(&self) -> u64 {
        self.total_pass() + self.total_block()
    }
    fn total_pass(&self) -> u64;
    fn total_success(&self) -> u64;
    fn total_block(&self) -> u64;
    fn total_exception(&self) -> u64;

    // writers
    fn add_pass_request(&self, count: u32);
    fn add_rt_and_success(&self, rt: u64, success: u32);
    fn increase_block(&self, count: u32);
    fn increase_exception(&self, count: u32);
    fn increase_thread_num(&self);
    fn decrease_thread_num(&self);

    // occupation (priority) protocol
    /// Estimate the wait (ms) until enough quota frees up for `acquire_count`
    /// under `threshold`, or a sentinel `>= occupy timeout` when occupation
    /// is impossible.
    fn try_occupy_next(&self, now: u64, acquire_count: u32, threshold: f64) -> u64;
    fn add_waiting_request(&self, future_time: u64, count: u32);
    fn add_occupied_pass(&self, count: u32);
    fn waiting(&self) -> u64;

    // invocation tree; meaningful on per-context and entrance nodes only
    fn res_name(&self) -> String {
        String::new()
    }
    fn add_child(&self, _child: Arc<dyn Node>) {}
    fn child_list(&self) -> Vec<Arc<dyn Node>> {
        Vec::new()
    }

    fn reset(&self);
}

const ILLEGAL_STATISTIC_PARAMS_ERROR: &str =
    "Invalid parameters, sample_count or interval_ms, for metric statistic";
const ILLEGAL_GLOBAL_STATISTIC_PARAMS_ERROR: &str =
    "Invalid parameters, sample_count or interval_ms, for resource's global statistic";
const GLOBAL_STATISTIC_NON_REUSABLE_ERROR: &str =
    "The parameters, sample_count and interval_ms, mismatch for reusing between resource's global statistic and readonly metric statistic.";

pub fn check_validity_for_statistic(
    sample_count: u32,
    interval_ms: u32,
    error_msg: &'static str,
) -> Result<()> {
    if interval_ms == 0 || sample_count == 0 || interval_ms % sample_count != 0 {
        return Err(Error::msg(error_msg));
    }
    Ok(())
}

/// Checks whether a readonly metric view can be built on top of a resource's
/// global statistic array.
pub fn check_validity_for_reuse_statistic(
    sample_count: u32,
    interval_ms: u32,
    parent_sample_count: u32,
    parent_interval_ms: u32,
) -> Result<()> {
    check_validity_for_statistic(sample_count, interval_ms, ILLEGAL_STATISTIC_PARAMS_ERROR)?;
    let bucket_len_ms = interval_ms / sample_count;

    check_validity_for_statistic(
        parent_sample_count,
        parent_interval_ms,
        ILLEGAL_GLOBAL_STATISTIC_PARAMS_ERROR,
    )?;
    let parent_bucket_len_ms = parent_interval_ms / parent_sample_count;

    // the view's interval must evenly divide the parent's interval
    if parent_interval_ms % interval_ms != 0 {
        return Err(Error::msg(GLOBAL_STATISTIC_NON_REUSABLE_ERROR));
    }
    // the view's bucket must be a multiple of the parent's bucket
    if bucket_len_ms % parent_bucket_len_ms != 0 {
        return Err(Error::msg(GLOBAL_STATISTIC_NON_REUSABLE_ERROR));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) use test::MockNode;

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use mockall::mock;

    mock! {
        #[derive(Debug)]
        pub(crate) Node {}
        impl Node for Node {
            fn pass_qps(&self) -> f64;
            fn block_qps(&self) -> f64;
            fn total_qps(&self) -> f64;
            fn success_qps(&self) -> f64;
            fn exception_qps(&self) -> f64;
            fn occupied_pass_qps(&self) -> f64;
            fn previous_pass_qps(&self) -> f64;
            fn max_success_qps(&self) -> f64;
            fn avg_rt(&self) -> f64;
            fn min_rt(&self) -> f64;
            fn cur_thread_num(&self) -> u32;
            fn total_request(&self) -> u64;
            fn total_pass(&self) -> u64;
            fn total_success(&self) -> u64;
            fn total_block(&self) -> u64;
            fn total_exception(&self) -> u64;
            fn add_pass_request(&self, count: u32);
            fn add_rt_and_success(&self, rt: u64, success: u32);
            fn increase_block(&self, count: u32);
            fn increase_exception(&self, count: u32);
            fn increase_thread_num(&self);
            fn decrease_thread_num(&self);
            fn try_occupy_next(&self, now: u64, acquire_count: u32, threshold: f64) -> u64;
            fn add_waiting_request(&self, future_time: u64, count: u32);
            fn add_occupied_pass(&self, count: u32);
            fn waiting(&self) -> u64;
            fn res_name(&self) -> String;
            fn add_child(&self, child: Arc<dyn Node>);
            fn child_list(&self) -> Vec<Arc<dyn Node>>;
            fn reset(&self);
        }
    }

    #[test]
    fn valid() {
        check_validity_for_reuse_statistic(1, 1000, 100, 10000).unwrap();
        check_validity_for_reuse_statistic(2, 1000, 20, 10000).unwrap();
    }

    #[test]
    fn invalid() {
        assert_eq!(
            check_validity_for_reuse_statistic(3, 1000, 20, 10000)
                .unwrap_err()
                .to_string(),
            ILLEGAL_STATISTIC_PARAMS_ERROR
        );
        assert_eq!(
            check_validity_for_reuse_statistic(2, 1000, 21, 10000)
                .unwrap_err()
                .to_string(),
            ILLEGAL_GLOBAL_STATISTIC_PARAMS_ERROR
        );
        assert_eq!(
            check_validity_for_reuse_statistic(2, 8000, 20, 10000)
                .unwrap_err()
                .to_string(),
            GLOBAL_STATISTIC_NON_REUSABLE_ERROR
        );
        assert_eq!(
            check_validity_for_reuse_statistic(2, 1000, 10, 10000)
                .unwrap_err()
                .to_string(),
            GLOBAL_STATISTIC_NON_REUSABLE_ERROR
        );
    }
}
