use super::{BucketLeapArray, BucketWrap, MetricBucket};
use crate::base::MetricEvent;
use crate::utils::curr_time_millis;
use crate::Result;
use std::sync::Arc;

/// A bucket ring that additionally lets prioritized requests borrow quota
/// from buckets that have not started yet.
///
/// Pre-occupied passes are written into the `borrow` ring at their future
/// window start. When the main ring recycles a slot for a new window, the
/// matching borrowed count is folded into the fresh bucket's `Pass` counter,
/// so occupation reduces the availability of the window it lands in.
#[derive(Debug)]
pub struct OccupiableBucketLeapArray {
    main: Arc<BucketLeapArray>,
    borrow: BucketLeapArray,
}

impl OccupiableBucketLeapArray {
    pub fn new(sample_count: u32, interval_ms: u32) -> Result<Self> {
        Ok(OccupiableBucketLeapArray {
            main: Arc::new(BucketLeapArray::new(sample_count, interval_ms)?),
            borrow: BucketLeapArray::new(sample_count, interval_ms)?,
        })
    }

    /// The main ring, for building readonly metric views.
    pub fn main_array(&self) -> Arc<BucketLeapArray> {
        Arc::clone(&self.main)
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.main.bucket_len_ms()
    }

    pub fn sample_count(&self) -> u32 {
        self.main.sample_count()
    }

    pub fn interval_ms(&self) -> u32 {
        self.main.interval_ms()
    }

    pub fn add_count(&self, event: MetricEvent, count: u64) {
        self.add_count_with_time(curr_time_millis(), event, count).ok();
    }

    pub fn add_count_with_time(&self, now: u64, event: MetricEvent, count: u64) -> Result<()> {
        let bucket = self.current_bucket_of_time(now)?;
        bucket.value().add(event, count);
        Ok(())
    }

    fn current_bucket_of_time(&self, now: u64) -> Result<Arc<BucketWrap<MetricBucket>>> {
        self.main.get_bucket_of_time_with(now, |fresh, start| {
            if let Ok(borrowed) = self.borrow.get_bucket_value(start) {
                let occupied = borrowed.get(MetricEvent::Pass);
                if occupied > 0 {
                    fresh.add_count(MetricEvent::Pass, occupied);
                }
            }
        })
    }

    pub fn count(&self, event: MetricEvent) -> u64 {
        self.count_with_time(curr_time_millis(), event)
    }

    pub fn count_with_time(&self, now: u64, event: MetricEvent) -> u64 {
        self.main.count_with_time(now, event)
    }

    /// Pass count of the single main bucket covering `time`.
    pub fn window_pass(&self, time: u64) -> u64 {
        self.main.window_count(time, MetricEvent::Pass)
    }

    /// Registers `count` pre-occupied passes at the window covering
    /// `future_time`.
    pub fn add_waiting(&self, future_time: u64, count: u64) {
        self.borrow
            .add_count_with_time(future_time, MetricEvent::Pass, count)
            .ok();
    }

    /// Sum of pre-occupied passes in windows that have not started yet.
    pub fn current_waiting(&self, now: u64) -> u64 {
        let mut res = 0;
        for bucket in &self.borrow.array {
            if bucket.start_stamp() > now {
                res += bucket.value().get(MetricEvent::Pass);
            }
        }
        res
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE_COUNT: u32 = 2;
    const INTERVAL_MS: u32 = 1000;
    const BUCKET_LEN_MS: u64 = 500;

    #[test]
    fn waiting_is_future_only() {
        let arr = OccupiableBucketLeapArray::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1676296044000u64;
        arr.add_waiting(now + BUCKET_LEN_MS, 3);
        assert_eq!(arr.current_waiting(now), 3);
        // once that window starts, nothing is waiting anymore
        assert_eq!(arr.current_waiting(now + BUCKET_LEN_MS), 0);
    }

    #[test]
    fn borrowed_pass_materializes() {
        let arr = OccupiableBucketLeapArray::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1676296044000u64;
        // claim both slots of the ring
        arr.add_count_with_time(now, MetricEvent::Pass, 1).unwrap();
        arr.add_count_with_time(now + BUCKET_LEN_MS, MetricEvent::Pass, 1)
            .unwrap();
        // borrow quota from the window one rotation ahead of `now`
        let future = now + INTERVAL_MS as u64;
        arr.add_waiting(future, 4);
        assert_eq!(arr.current_waiting(now + BUCKET_LEN_MS), 4);
        // recycling the slot for the future window folds the borrow in
        arr.add_count_with_time(future, MetricEvent::Pass, 1).unwrap();
        assert_eq!(arr.window_pass(future), 5);
    }
}
