use super::{BucketLeapArray, OccupiableBucketLeapArray, SlidingWindowMetric};
use crate::base::{MetricEvent, MetricItem, MetricItemRetriever, Node, TimePredicate};
use crate::{config, utils::curr_time_millis};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

/// The leaf metric holder: a second-level window for real-time QPS decisions,
/// a minute-level window for totals, and the concurrent-call counter.
#[derive(Debug)]
pub struct StatisticNode {
    /// second-level ring, supports quota borrowing by prioritized requests
    second: OccupiableBucketLeapArray,
    second_metric: SlidingWindowMetric,
    minute: Arc<BucketLeapArray>,
    minute_metric: SlidingWindowMetric,
    cur_thread_num: AtomicU32,
}

impl Default for StatisticNode {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticNode {
    pub fn new() -> Self {
        let second = OccupiableBucketLeapArray::new(
            config::second_sample_count(),
            config::second_interval_ms(),
        )
        .unwrap();
        let second_metric = SlidingWindowMetric::new(
            config::second_sample_count(),
            config::second_interval_ms(),
            second.main_array(),
        )
        .unwrap();
        let minute = Arc::new(
            BucketLeapArray::new(config::minute_sample_count(), config::minute_interval_ms())
                .unwrap(),
        );
        let minute_metric = SlidingWindowMetric::new(
            config::minute_sample_count(),
            config::minute_interval_ms(),
            Arc::clone(&minute),
        )
        .unwrap();
        StatisticNode {
            second,
            second_metric,
            minute,
            minute_metric,
            cur_thread_num: AtomicU32::new(0),
        }
    }

    pub fn second_metric(&self) -> &SlidingWindowMetric {
        &self.second_metric
    }

    pub fn minute_metric(&self) -> &SlidingWindowMetric {
        &self.minute_metric
    }
}

impl MetricItemRetriever for StatisticNode {
    fn metrics_on_condition(&self, predicate: &TimePredicate) -> Vec<MetricItem> {
        self.minute_metric.second_metrics_on_condition(predicate)
    }
}

impl Node for StatisticNode {
    fn pass_qps(&self) -> f64 {
        self.second_metric.qps(MetricEvent::Pass)
    }

    fn block_qps(&self) -> f64 {
        self.second_metric.qps(MetricEvent::Block)
    }

    fn success_qps(&self) -> f64 {
        self.second_metric.qps(MetricEvent::Success)
    }

    fn exception_qps(&self) -> f64 {
        self.second_metric.qps(MetricEvent::Error)
    }

    fn occupied_pass_qps(&self) -> f64 {
        self.minute_metric.qps(MetricEvent::OccupiedPass)
    }

    fn previous_pass_qps(&self) -> f64 {
        // the minute ring has one-second buckets, so the previous bucket's
        // pass count is the pass QPS of the previous second
        self.minute
            .window_count(curr_time_millis() - 1000, MetricEvent::Pass) as f64
    }

    fn max_success_qps(&self) -> f64 {
        self.second_metric.max_of_single_bucket(MetricEvent::Success) as f64 * 1000.0
            / self.second_metric.bucket_len_ms() as f64
    }

    fn avg_rt(&self) -> f64 {
        self.second_metric.avg_rt()
    }

    fn min_rt(&self) -> f64 {
        self.second_metric.min_rt()
    }

    fn cur_thread_num(&self) -> u32 {
        self.cur_thread_num.load(Ordering::SeqCst)
    }

    fn total_pass(&self) -> u64 {
        self.minute_metric.sum(MetricEvent::Pass)
    }

    fn total_success(&self) -> u64 {
        self.minute_metric.sum(MetricEvent::Success)
    }

    fn total_block(&self) -> u64 {
        self.minute_metric.sum(MetricEvent::Block)
    }

    fn total_exception(&self) -> u64 {
        self.minute_metric.sum(MetricEvent::Error)
    }

    fn add_pass_request(&self, count: u32) {
        self.second.add_count(MetricEvent::Pass, count as u64);
        self.minute.add_count(MetricEvent::Pass, count as u64);
    }

    fn add_rt_and_success(&self, rt: u64, success: u32) {
        self.second.add_count(MetricEvent::Success, success as u64);
        self.second.add_count(MetricEvent::Rt, rt);
        self.minute.add_count(MetricEvent::Success, success as u64);
        self.minute.add_count(MetricEvent::Rt, rt);
    }

    fn increase_block(&self, count: u32) {
        self.second.add_count(MetricEvent::Block, count as u64);
        self.minute.add_count(MetricEvent::Block, count as u64);
    }

    fn increase_exception(&self, count: u32) {
        self.second.add_count(MetricEvent::Error, count as u64);
        self.minute.add_count(MetricEvent::Error, count as u64);
    }

    fn increase_thread_num(&self) {
        let cur = self.cur_thread_num.fetch_add(1, Ordering::SeqCst) + 1;
        self.minute.update_concurrency(cur);
    }

    fn decrease_thread_num(&self) {
        self.cur_thread_num
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_sub(1))
            })
            .ok();
    }

    /// Walk the upcoming window starts inside the occupation horizon and find
    /// the earliest one at which the rolling pass sum plus the pending
    /// borrows leaves room for `acquire_count` under `threshold`.
    fn try_occupy_next(&self, now: u64, acquire_count: u32, threshold: f64) -> u64 {
        let occupy_timeout = config::occupy_timeout_ms();
        let max_count = threshold * self.second.interval_ms() as f64 / 1000.0;
        let current_borrow = self.second.current_waiting(now);
        if current_borrow as f64 >= max_count {
            return occupy_timeout;
        }
        let window_length = self.second.bucket_len_ms() as u64;
        let mut earliest = now - now % window_length + window_length
            - self.second.interval_ms() as u64;
        let current_pass = self.second.count_with_time(now, MetricEvent::Pass);
        let mut idx: u64 = 0;
        while earliest < now {
            let wait_in_ms = idx * window_length + window_length - now % window_length;
            if wait_in_ms >= occupy_timeout {
                break;
            }
            let window_pass = self.second.window_pass(earliest);
            if (current_pass + current_borrow + acquire_count as u64) as f64
                - window_pass as f64
                <= max_count
            {
                return wait_in_ms;
            }
            earliest += window_length;
            idx += 1;
        }
        occupy_timeout
    }

    fn add_waiting_request(&self, future_time: u64, count: u32) {
        self.second.add_waiting(future_time, count as u64);
    }

    fn add_occupied_pass(&self, count: u32) {
        self.minute.add_count(MetricEvent::OccupiedPass, count as u64);
    }

    fn waiting(&self) -> u64 {
        self.second.current_waiting(curr_time_millis())
    }

    fn reset(&self) {
        for bucket in &self.second.main_array().array {
            bucket.reset_start_stamp(0);
            bucket.reset_value();
        }
        for bucket in &self.minute.array {
            bucket.reset_start_stamp(0);
            bucket.reset_value();
        }
        self.cur_thread_num.store(0, Ordering::SeqCst);
    }
}
