use super::{LeapArray, MetricBucket};
use crate::base::{MetricEvent, DEFAULT_STATISTIC_MAX_RT};
use crate::utils::curr_time_millis;
use crate::Result;
use std::cmp;

/// a specialization of `LeapArray<T>` with `MetricBucket`
pub type BucketLeapArray = LeapArray<MetricBucket>;

impl BucketLeapArray {
    pub fn add_count(&self, event: MetricEvent, count: u64) {
        self.add_count_with_time(curr_time_millis(), event, count)
            .ok();
    }

    pub fn add_count_with_time(&self, now: u64, event: MetricEvent, count: u64) -> Result<()> {
        let bucket = self.get_bucket_of_time(now)?;
        bucket.value().add(event, count);
        Ok(())
    }

    pub fn update_concurrency(&self, concurrency: u32) {
        self.update_concurrency_with_time(curr_time_millis(), concurrency)
            .ok();
    }

    pub fn update_concurrency_with_time(&self, now: u64, concurrency: u32) -> Result<()> {
        let bucket = self.get_bucket_of_time(now)?;
        bucket.value().update_concurrency(concurrency);
        Ok(())
    }

    pub fn count(&self, event: MetricEvent) -> u64 {
        self.count_with_time(curr_time_millis(), event)
    }

    pub fn count_with_time(&self, now: u64, event: MetricEvent) -> u64 {
        let mut res = 0;
        for b in self.get_valid_values(now) {
            res += b.value().get(event);
        }
        res
    }

    /// Counter value of the single bucket covering `time`, zero when the slot
    /// has already been recycled.
    pub fn window_count(&self, time: u64, event: MetricEvent) -> u64 {
        self.get_bucket_value(time).map(|b| b.get(event)).unwrap_or(0)
    }

    pub fn min_rt(&self) -> u64 {
        let mut res = DEFAULT_STATISTIC_MAX_RT;
        for b in self.get_current_values() {
            res = cmp::min(res, b.value().min_rt());
        }
        res
    }

    pub fn max_concurrency(&self) -> u32 {
        let mut res = 0;
        for b in self.get_current_values() {
            res = cmp::max(res, b.value().max_concurrency());
        }
        res
    }
}
