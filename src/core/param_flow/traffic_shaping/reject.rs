//! Per-value token bucket with direct rejection.

use super::*;
use crate::{
    base::{BlockType, ParamKey, TokenResult},
    utils,
};
use std::sync::{atomic::Ordering, Arc};

#[derive(Debug)]
pub struct RejectChecker {
    rule: Arc<Rule>,
    metric: Arc<ParamsMetric>,
}

impl RejectChecker {
    pub fn new(rule: Arc<Rule>, metric: Arc<ParamsMetric>) -> Self {
        RejectChecker { rule, metric }
    }
}

impl Checker for RejectChecker {
    fn do_check(&self, arg: ParamKey, batch_count: u32) -> TokenResult {
        let time_counter = &self.metric.rule_time_counter;
        let token_counter = &self.metric.rule_token_counter;
        if time_counter.cap() == 0 || token_counter.cap() == 0 {
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

        let max_count = token_count + self.rule.burst_count;
        if batch_count as u64 > max_count {
            let msg = format!(
                "parameter reject check blocked, request batch count exceeds the max token count, arg: {:?}",
                arg
            );
            return TokenResult::new_blocked_with_cause(
                BlockType::ParamFlow,
                msg,
                self.rule.clone(),
                Arc::new(batch_count),
            );
        }

        loop {
            let current_time_in_ms = utils::curr_time_millis();
            let last_add_token_time = time_counter.add_if_absent(arg.clone(), current_time_in_ms);
            if last_add_token_time.is_none() {
                // first fill, consume the tokens of this call immediately
                token_counter.add_if_absent(arg, max_count - batch_count as u64);
                return TokenResult::new_pass();
            }
            let last_add_token_time = last_add_token_time.unwrap();

            // how long since the bucket was last refilled
            let pass_time =
                current_time_in_ms as i64 - last_add_token_time.load(Ordering::SeqCst) as i64;
            if pass_time > (self.rule.duration_in_sec * 1000) as i64 {
                // the statistic window has passed, refill the tokens
                let left_count = max_count - batch_count as u64;
                let old_qps = token_counter.add_if_absent(arg.clone(), left_count);
                if old_qps.is_none() {
                    // might not be accurate here
                    last_add_token_time.store(current_time_in_ms, Ordering::SeqCst);
                    return TokenResult::new_pass();
                }
                let old_qps = old_qps.unwrap();
                let rest_qps = old_qps.load(Ordering::SeqCst);
                let to_add_token_num =
                    pass_time as u64 * token_count / (self.rule.duration_in_sec * 1000);
                let new_qps = {
                    if to_add_token_num + rest_qps > max_count {
                        max_count as i64 - batch_count as i64
                    } else {
                        to_add_token_num as i64 + rest_qps as i64 - batch_count as i64
                    }
                };
                if new_qps < 0 {
                    let msg = format!(
                        "parameter reject check blocked, request batch count exceeds the available token count, arg: {:?}",
                        arg
                    );
                    return TokenResult::new_blocked_with_cause(
                        BlockType::ParamFlow,
                        msg,
                        self.rule.clone(),
                        Arc::new(token_count),
                    );
                }
                if old_qps
                    .compare_exchange(
                        rest_qps,
                        new_qps as u64,
                        Ordering::SeqCst,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    last_add_token_time.store(current_time_in_ms, Ordering::SeqCst);
                    return TokenResult::new_pass();
                }
                std::thread::yield_now();
            } else {
                // within the window: check whether the rest of the tokens
                // covers the batch
                if let Some(old_qps) = token_counter.get(&arg) {
                    let old_rest_token = old_qps.load(Ordering::SeqCst);
                    if old_rest_token >= batch_count as u64 {
                        if old_qps
                            .compare_exchange(
                                old_rest_token,
                                old_rest_token - batch_count as u64,
                                Ordering::SeqCst,
                                Ordering::Relaxed,
                            )
                            .is_ok()
                        {
                            return TokenResult::new_pass();
                        }
                    } else {
                        let msg = format!(
                            "parameter reject check blocked, request batch count exceeds the available token count, arg: {:?}",
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
                std::thread::yield_now();
            }
        }
    }
}
