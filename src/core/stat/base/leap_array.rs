use super::MetricTrait;
use crate::base::TimePredicate;
use crate::utils::curr_time_millis;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const DEFAULT_TIME: u64 = 0;

/// BucketWrap pairs a counter cell with the start timestamp of the window it
/// currently represents. The covered span is
/// `[start_stamp, start_stamp + bucket_len_ms)`.
#[derive(Debug, Default)]
pub struct BucketWrap<T: MetricTrait> {
    start_stamp: AtomicU64,
    value: T,
}

impl<T: MetricTrait> BucketWrap<T> {
    pub fn new(start_stamp: u64) -> Self {
        BucketWrap {
            start_stamp: AtomicU64::new(start_stamp),
            value: T::default(),
        }
    }

    pub fn start_stamp(&self) -> u64 {
        self.start_stamp.load(Ordering::SeqCst)
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn reset_start_stamp(&self, start_stamp: u64) {
        self.start_stamp.store(start_stamp, Ordering::SeqCst);
    }

    pub fn reset_value(&self) {
        self.value.reset();
    }

    pub fn is_time_in_bucket(&self, now: u64, bucket_len_ms: u32) -> bool {
        let start = self.start_stamp();
        start <= now && now < start + (bucket_len_ms as u64)
    }

    pub fn is_deprecated(&self, now: u64, interval: u64) -> bool {
        let start = self.start_stamp();
        now > start && now - start > interval
    }
}

/// The time-aligned counter ring. The inner vector is treated as a circle of
/// `sample_count` buckets of `bucket_len_ms` each, covering `interval_ms` in
/// total. Race resolution relies on the atomic counters inside the buckets;
/// the per-slot mutex guards only the bucket-reset transition.
#[derive(Debug)]
pub struct LeapArray<T: MetricTrait> {
    bucket_len_ms: u32,
    sample_count: u32,
    interval_ms: u32,
    pub(crate) array: Vec<Arc<BucketWrap<T>>>,
    mutex: Vec<Mutex<bool>>,
}

impl<T: MetricTrait> LeapArray<T> {
    pub fn new(sample_count: u32, interval_ms: u32) -> Result<Self> {
        if sample_count == 0 || interval_ms % sample_count != 0 {
            return Err(Error::msg(
                "Invalid sample count or interval_ms. Time span needs to be evenly divided",
            ));
        }
        let mut array = Vec::with_capacity(sample_count as usize);
        let mut mutex = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            array.push(Arc::new(BucketWrap::default()));
            mutex.push(Mutex::new(false));
        }
        Ok(LeapArray {
            bucket_len_ms: interval_ms / sample_count,
            sample_count,
            interval_ms,
            array,
            mutex,
        })
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.bucket_len_ms
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn reset_bucket(&self, idx: usize, start_stamp: u64) {
        self.array[idx].reset_start_stamp(start_stamp);
        self.array[idx].reset_value();
    }

    pub fn current_bucket(&self) -> Result<Arc<BucketWrap<T>>> {
        self.get_bucket_of_time(curr_time_millis())
    }

    /// Resolves the bucket covering `now`, installing or recycling the slot
    /// when necessary:
    /// - slot untouched: claim it by stamping the aligned start;
    /// - start matches the aligned start: fast path, return it;
    /// - start lies in the past: stale, reset under the slot mutex;
    /// - start lies in the future: clock regression, report an error so the
    ///   caller can drop the sample.
    pub fn get_bucket_of_time(&self, now: u64) -> Result<Arc<BucketWrap<T>>> {
        self.get_bucket_of_time_with(now, |_, _| {})
    }

    /// Same as `get_bucket_of_time`, with a hook fired while holding the
    /// reset lock after a stale bucket was re-stamped. The hook receives the
    /// fresh bucket value and the new window start.
    pub(crate) fn get_bucket_of_time_with(
        &self,
        now: u64,
        on_reset: impl Fn(&T, u64),
    ) -> Result<Arc<BucketWrap<T>>> {
        let idx = self.time2idx(now) as usize;
        let target_start = self.calculate_start_stamp(now);
        let bucket = Arc::clone(&self.array[idx]);
        loop {
            let start = bucket.start_stamp();
            if start == DEFAULT_TIME {
                // empty slot, claim it for the target window
                bucket.reset_start_stamp(target_start);
                return Ok(Arc::clone(&bucket));
            } else if start == target_start {
                return Ok(Arc::clone(&bucket));
            } else if start < target_start {
                // Deprecated bucket, must be reset to the target window.
                // Reset and clean-up are hard to make atomic, so a narrow
                // per-slot lock guards the transition; it only takes effect
                // when a bucket crosses its window border.
                if let Ok(_guard) = self.mutex[idx].try_lock() {
                    if bucket.start_stamp() == start {
                        self.reset_bucket(idx, target_start);
                        on_reset(self.array[idx].value(), target_start);
                    }
                    return Ok(Arc::clone(&self.array[idx]));
                } else {
                    // another thread is resetting; let it finish
                    std::thread::yield_now();
                }
            } else {
                return Err(Error::msg("invalid timestamp, cannot find bucket"));
            }
        }
    }

    /// compute the aligned start timestamp of the bucket covering `now`
    pub(crate) fn calculate_start_stamp(&self, now: u64) -> u64 {
        now - now % (self.bucket_len_ms as u64)
    }

    pub(crate) fn time2idx(&self, now: u64) -> u64 {
        let idx = now / (self.bucket_len_ms as u64);
        idx % (self.sample_count as u64)
    }

    /// Reads the bucket value covering `now` without recycling slots.
    pub fn get_bucket_value(&self, now: u64) -> Result<&T> {
        let idx = self.time2idx(now) as usize;
        let bucket = &self.array[idx];
        if bucket.is_time_in_bucket(now, self.bucket_len_ms) {
            Ok(bucket.value())
        } else {
            Err(Error::msg("invalid time, cannot get value in the bucket"))
        }
    }

    pub fn get_current_values(&self) -> Vec<Arc<BucketWrap<T>>> {
        self.get_valid_values(curr_time_millis())
    }

    /// All buckets whose window lies within `(now - interval_ms, now]`.
    pub fn get_valid_values(&self, now: u64) -> Vec<Arc<BucketWrap<T>>> {
        self.get_valid_values_conditional(now, &|_| true)
    }

    pub fn get_valid_values_conditional(
        &self,
        now: u64,
        condition: &TimePredicate,
    ) -> Vec<Arc<BucketWrap<T>>> {
        let mut res = Vec::new();
        for bucket in &self.array {
            if !bucket.is_deprecated(now, self.interval_ms as u64)
                && condition(bucket.start_stamp())
                && bucket.start_stamp() != DEFAULT_TIME
            {
                res.push(Arc::clone(bucket));
            }
        }
        res
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE_COUNT: u32 = 20;
    const BUCKET_LEN_MS: u32 = 500; // 500 ms
    const INTERVAL_MS: u32 = BUCKET_LEN_MS * SAMPLE_COUNT; // 10 s

    impl MetricTrait for AtomicU64 {
        fn reset(&self) {
            self.store(0, Ordering::SeqCst);
        }
    }
    type LeapArrayAtomicU64 = LeapArray<AtomicU64>;

    #[test]
    fn time_idx() {
        let arr = LeapArrayAtomicU64::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        assert_eq!(arr.time2idx(1576296044907), 9);
        assert_eq!(arr.calculate_start_stamp(1576296044907), 1576296044500);
    }

    #[test]
    fn start_time() {
        let arr = LeapArrayAtomicU64::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1596199310000;
        let bucket = arr.get_bucket_of_time(now + 801).unwrap();
        assert_eq!(bucket.start_stamp(), now + 500);
        assert!(Arc::ptr_eq(&bucket, arr.array.get(1).unwrap()));
    }

    #[test]
    fn deprecated() {
        let now = 1576296044907;
        let bucket = BucketWrap::<AtomicU64>::new(1576296004907);
        assert!(bucket.is_deprecated(now, INTERVAL_MS as u64));
    }

    #[test]
    fn clock_regression() {
        let arr = LeapArrayAtomicU64::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1596199310000;
        arr.get_bucket_of_time(now).unwrap();
        // a timestamp older than the resolved window must not recycle it
        assert!(arr.get_bucket_of_time(now - INTERVAL_MS as u64).is_err());
    }

    #[test]
    fn stale_reset() {
        let arr = LeapArrayAtomicU64::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1596199310000u64;
        let bucket = arr.get_bucket_of_time(now).unwrap();
        bucket.value().store(7, Ordering::SeqCst);
        // one full rotation later the same slot is recycled with zeroed value
        let later = now + INTERVAL_MS as u64;
        let recycled = arr.get_bucket_of_time(later).unwrap();
        assert_eq!(recycled.start_stamp(), later);
        assert_eq!(recycled.value().load(Ordering::SeqCst), 0);
    }
}
