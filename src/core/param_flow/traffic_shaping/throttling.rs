//! Per-value virtual queue: requests of one parameter value line up at the
//! admission interval and wait, until the queueing time exceeds the limit.

use super::*;
use crate::{
    base::{BlockType, ParamKey, TokenResult},
    utils,
};
use std::sync::{atomic::Ordering, Arc};

#[derive(Debug)]
pub struct ThrottlingChecker {
    rule: Arc<Rule>,
    metric: Arc<ParamsMetric>,
}

impl ThrottlingChecker {
    pub fn new(rule: Arc<Rule>, metric: Arc<ParamsMetric>) -> Self {
        ThrottlingChecker { rule, metric }
    }
}

impl Checker for ThrottlingChecker {
    fn do_check(&self, arg: ParamKey, batch_count: u32) -> TokenResult {
        let time_counter = &self.metric.rule_time_counter;
        if time_counter.cap() == 0 {
            return TokenResult::new_pass();
        }
        let token_count = self
            .rule
            .specific_items
            .get(&arg)
            .copied()
            .unwrap_or(self.rule.threshold);
        if token_count == 0 {
            let msg = format!("parameter QPS check blocked, threshold is 0, arg: {:?}", arg);
            return TokenResult::new_blocked_with_cause(
                BlockType::ParamFlow,
                msg,
                self.rule.clone(),
                Arc::new(token_count),
            );
        }

        let interval_cost_time = ((batch_count as u64 * self.rule.duration_in_sec * 1000) as f64
            / token_count as f64)
            .round() as u64;
        loop {
            let current_time_in_ms = utils::curr_time_millis();
            let last_pass_time_arc = time_counter.add_if_absent(arg.clone(), current_time_in_ms);
            if last_pass_time_arc.is_none() {
                return TokenResult::new_pass();
            }
            let last_pass_time_arc = last_pass_time_arc.unwrap();
            let last_pass_time = last_pass_time_arc.load(Ordering::SeqCst);
            let expected_time = last_pass_time + interval_cost_time;

            if expected_time <= current_time_in_ms
                || expected_time - current_time_in_ms < self.rule.max_queueing_time_ms
            {
                if last_pass_time_arc
                    .compare_exchange(
                        last_pass_time,
                        current_time_in_ms,
                        Ordering::SeqCst,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    let await_time = expected_time as i64 - current_time_in_ms as i64;
                    if await_time > 0 {
                        last_pass_time_arc.store(expected_time, Ordering::SeqCst);
                        return TokenResult::new_should_wait(await_time as u64 * 1_000_000);
                    } else {
                        return TokenResult::new_pass();
                    }
                }
                std::thread::yield_now();
            } else {
                let msg = format!(
                    "parameter throttling check blocked, wait time exceeds the max queueing time, arg: {:?}",
                    arg
                );
                return TokenResult::new_blocked_with_cause(
                    BlockType::ParamFlow,
                    msg,
                    self.rule.clone(),
                    Arc::new(token_count),
                );
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::super::rule_manager::gen_throttling;
    use super::*;

    fn throttling_rule(res: &str, threshold: u64, max_queueing_time_ms: u64) -> Arc<Rule> {
        Arc::new(Rule {
            resource: res.into(),
            metric_type: MetricType::Qps,
            control_strategy: ControlStrategy::Throttling,
            threshold,
            duration_in_sec: 1,
            max_queueing_time_ms,
            ..Default::default()
        })
    }

    #[test]
    fn first_request_passes() {
        let controller = gen_throttling(throttling_rule("param_throttle_first", 5, 1000), None);
        assert!(controller.perform_checking("k".into(), 1).is_pass());
    }

    #[test]
    fn queue_then_reject() {
        let controller = gen_throttling(throttling_rule("param_throttle_queue", 5, 300), None);
        assert!(controller.perform_checking("k".into(), 1).is_pass());
        // the next request is ~200 ms out, inside the queueing budget
        let r = controller.perform_checking("k".into(), 1);
        assert!(r.is_wait());
        assert!(r.nanos_to_wait() > 0);
        // the one after would exceed 300 ms and rejects
        let r = controller.perform_checking("k".into(), 1);
        assert!(r.is_blocked());
        // an unrelated value is unaffected
        assert!(controller.perform_checking("k2".into(), 1).is_pass());
    }

    #[test]
    fn zero_threshold_rejects() {
        let controller = gen_throttling(throttling_rule("param_throttle_zero", 0, 300), None);
        assert!(controller.perform_checking("k".into(), 1).is_blocked());
    }
}
