//! Throttling lets pending requests wait in a virtual queue until free
//! capacity is available, pacing them at the admission interval.

use super::{Checker, Rule};
use crate::base::{BlockType, Node, TokenResult};
use crate::utils;
use std::convert::TryInto;
use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

static BLOCK_MSG_QUEUEING: &str = "flow throttling check blocked, estimated queueing time exceeds the limit";

const STAT_INTERVAL_NS: i64 = 1_000_000_000;

#[derive(Debug)]
pub struct ThrottlingChecker {
    rule: Arc<Rule>,
    max_queueing_time_ns: i64,
    /// expected pass time of the queue tail; establishes the total order of
    /// admitted requests
    last_passed_time: AtomicI64,
}

impl ThrottlingChecker {
    pub fn new(rule: Arc<Rule>) -> Self {
        let max_queueing_time_ns = utils::milli2nano(rule.max_queueing_time_ms)
            .try_into()
            .unwrap();
        ThrottlingChecker {
            rule,
            max_queueing_time_ns,
            last_passed_time: AtomicI64::new(0),
        }
    }

    fn reject(&self, snapshot: i64) -> TokenResult {
        TokenResult::new_blocked_with_cause(
            BlockType::Flow,
            BLOCK_MSG_QUEUEING.into(),
            self.rule.clone(),
            Arc::new(snapshot),
        )
    }
}

impl Checker for ThrottlingChecker {
    fn do_check(
        &self,
        _node: Arc<dyn Node>,
        batch_count: u32,
        threshold: f64,
        _prioritized: bool,
    ) -> TokenResult {
        if batch_count == 0 {
            return TokenResult::new_pass();
        }
        // a non-positive threshold admits nothing, and would overflow the
        // cost computation below
        if threshold <= 0.0 {
            return self.reject(0);
        }
        if batch_count as f64 > threshold {
            return TokenResult::new_blocked(BlockType::Flow);
        }

        // nanoseconds give enough resolution to pace sub-millisecond
        // admission intervals
        let curr_nano: i64 = utils::curr_time_nanos().try_into().unwrap();
        // the interval between two admitted requests
        let interval_ns = ((batch_count as f64) / threshold * (STAT_INTERVAL_NS as f64)) as i64;

        let loaded_last_passed_time = self.last_passed_time.load(Ordering::SeqCst);
        // expected pass time of this request
        let expected_time = loaded_last_passed_time + interval_ns;
        if expected_time <= curr_nano
            && self
                .last_passed_time
                .compare_exchange(
                    loaded_last_passed_time,
                    curr_nano,
                    Ordering::SeqCst,
                    Ordering::Relaxed,
                )
                .is_ok()
        {
            return TokenResult::new_pass();
        }

        // the pace was hit recently, the request has to queue
        let estimated_queue_duration =
            self.last_passed_time.load(Ordering::SeqCst) + interval_ns - curr_nano;
        if estimated_queue_duration > self.max_queueing_time_ns {
            return self.reject(estimated_queue_duration);
        }

        // claim the slot, then re-validate: a racing claim may have pushed
        // the queue past the limit, in which case the claim is rolled back
        let expected_time = self
            .last_passed_time
            .fetch_add(interval_ns, Ordering::SeqCst)
            + interval_ns;
        let estimated_queue_duration = expected_time - curr_nano;
        if estimated_queue_duration > self.max_queueing_time_ns {
            self.last_passed_time
                .fetch_sub(interval_ns, Ordering::SeqCst);
            return self.reject(estimated_queue_duration);
        }
        if estimated_queue_duration > 0 {
            TokenResult::new_should_wait(estimated_queue_duration.try_into().unwrap())
        } else {
            TokenResult::new_pass()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::MockNode;
    use std::sync::atomic::AtomicU32;

    fn nop_node() -> Arc<dyn Node> {
        Arc::new(MockNode::new())
    }

    fn checker(timeout_ms: u32) -> ThrottlingChecker {
        ThrottlingChecker::new(Arc::new(Rule {
            resource: "abc".into(),
            max_queueing_time_ms: timeout_ms,
            ..Default::default()
        }))
    }

    #[test]
    fn single_thread_no_queueing() {
        let threshold = 5.0;
        let tc = checker(0);

        // block when the batch exceeds the threshold outright
        assert!(tc.do_check(nop_node(), 6, threshold, false).is_blocked());

        // the first request passes and pins the pace
        assert!(tc.do_check(nop_node(), 1, threshold, false).is_pass());
        // immediate follow-ups cannot queue with a zero timeout
        for _ in 0..5 {
            assert!(tc.do_check(nop_node(), 1, threshold, false).is_blocked());
        }
        // one admission interval later the next request passes
        utils::sleep_for_ms(1000 / threshold as u64 + 10);
        assert!(tc.do_check(nop_node(), 1, threshold, false).is_pass());
        assert!(tc.do_check(nop_node(), 1, threshold, false).is_blocked());
    }

    #[test]
    fn queueing_spacing() {
        let threshold = 5.0;
        let tc = checker(2000);

        assert!(tc.do_check(nop_node(), 1, threshold, false).is_pass());
        // subsequent requests line up at ~200 ms intervals
        let r2 = tc.do_check(nop_node(), 1, threshold, false);
        assert!(r2.is_wait());
        let w2 = r2.nanos_to_wait();
        let r3 = tc.do_check(nop_node(), 1, threshold, false);
        assert!(r3.is_wait());
        let w3 = r3.nanos_to_wait();
        let interval = 200_000_000u64;
        assert!(w2 > interval / 2 && w2 <= interval + interval / 2);
        assert!(w3 > w2 && w3 <= 2 * interval + interval / 2);
    }

    #[test]
    fn queueing_timeout_rejects() {
        let threshold = 5.0;
        // only one 200 ms slot fits into the 250 ms budget
        let tc = checker(250);
        assert!(tc.do_check(nop_node(), 1, threshold, false).is_pass());
        assert!(tc.do_check(nop_node(), 1, threshold, false).is_wait());
        assert!(tc.do_check(nop_node(), 1, threshold, false).is_blocked());
    }

    #[test]
    fn parallel_queueing() {
        let threshold = 5.0;
        let tc = Arc::new(checker(2000));

        assert!(tc.do_check(nop_node(), 1, threshold, false).is_pass());
        let thread_num: u32 = 24;
        let mut handles = Vec::with_capacity(thread_num as usize);
        let wait_count = Arc::new(AtomicU32::new(0));
        let block_count = Arc::new(AtomicU32::new(0));
        for _ in 0..thread_num {
            let tc = Arc::clone(&tc);
            let wait_count = Arc::clone(&wait_count);
            let block_count = Arc::clone(&block_count);
            handles.push(std::thread::spawn(move || {
                let res = tc.do_check(Arc::new(MockNode::new()), 1, threshold, false);
                if res.is_blocked() {
                    block_count.fetch_add(1, Ordering::SeqCst);
                } else if res.is_wait() {
                    wait_count.fetch_add(1, Ordering::SeqCst);
                } else {
                    panic!("should not pass");
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(
            thread_num,
            wait_count.load(Ordering::SeqCst) + block_count.load(Ordering::SeqCst)
        );
        // a 2 s budget at 200 ms per slot admits ~10 queued requests
        let waited = wait_count.load(Ordering::SeqCst);
        assert!((9..=11).contains(&waited));
    }
}
