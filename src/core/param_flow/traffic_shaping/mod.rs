pub mod reject;
pub mod throttling;

pub use reject::*;
pub use throttling::*;

use super::*;
use crate::{
    base::{BlockType, Entry, ParamKey, TokenResult},
    config, logging,
};
use std::cmp::min;
use std::sync::{atomic::Ordering, Arc};

/// Traffic shaping `Checker` performs the per-value checking according to the
/// current counters and the shaping strategy, then yields the token result.
pub trait Checker: Send + Sync + std::fmt::Debug {
    fn do_check(&self, arg: ParamKey, batch_count: u32) -> TokenResult;
}

#[derive(Debug)]
pub struct Controller {
    rule: Arc<Rule>,
    metric: Arc<ParamsMetric>,
    checker: Arc<dyn Checker>,
}

impl Controller {
    /// Sizes the counter caches from the rule; see the generators in the
    /// `rule_manager`.
    pub(crate) fn new_metric(rule: &Rule) -> ParamsMetric {
        match rule.metric_type {
            MetricType::Qps => {
                let capacity = {
                    if rule.params_max_capacity > 0 {
                        rule.params_max_capacity
                    } else if rule.duration_in_sec == 0 {
                        // in fact, this invalid rule won't be loaded
                        config::PARAMS_MAX_CAPACITY
                    } else {
                        min(
                            config::PARAMS_MAX_CAPACITY,
                            config::PARAMS_CAPACITY_BASE * rule.duration_in_sec as usize,
                        )
                    }
                };
                ParamsMetric {
                    rule_time_counter: ParamCounter::with_capacity(capacity),
                    rule_token_counter: ParamCounter::with_capacity(capacity),
                    ..Default::default()
                }
            }
            MetricType::Concurrency => {
                let capacity = {
                    if rule.params_max_capacity > 0 {
                        rule.params_max_capacity
                    } else {
                        config::CONCURRENCY_MAX_COUNT
                    }
                };
                ParamsMetric {
                    concurrency_counter: ParamCounter::with_capacity(capacity),
                    ..Default::default()
                }
            }
        }
    }

    pub fn new(rule: Arc<Rule>, metric: Arc<ParamsMetric>, checker: Arc<dyn Checker>) -> Self {
        Controller {
            rule,
            metric,
            checker,
        }
    }

    pub fn metric(&self) -> &Arc<ParamsMetric> {
        &self.metric
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn param_index(&self) -> isize {
        self.rule.param_index
    }

    pub fn perform_checking(&self, arg: ParamKey, batch_count: u32) -> TokenResult {
        match self.rule.metric_type {
            MetricType::Concurrency => self.perform_checking_for_concurrency_metric(arg),
            MetricType::Qps => self.checker.do_check(arg, batch_count),
        }
    }

    pub fn perform_checking_for_concurrency_metric(&self, arg: ParamKey) -> TokenResult {
        let last_concurrency = self
            .metric
            .concurrency_counter
            .add_if_absent(arg.clone(), 0);
        if last_concurrency.is_none() {
            return TokenResult::new_pass();
        }
        let concurrency = last_concurrency.unwrap().load(Ordering::SeqCst) + 1;

        // a threshold stored in `specific_items` overrides the rule's
        let threshold = self
            .rule
            .specific_items
            .get(&arg)
            .copied()
            .unwrap_or(self.rule.threshold);
        if concurrency <= threshold {
            TokenResult::new_pass()
        } else {
            let msg = format!(
                "parameter concurrency check blocked, arg: {:?}",
                arg
            );
            TokenResult::new_blocked_with_cause(
                BlockType::ParamFlow,
                msg,
                self.rule.clone(),
                Arc::new(concurrency),
            )
        }
    }

    /// Matches the checked parameter value from the entry input.
    pub fn extract_args(&self, entry: &Entry) -> Option<ParamKey> {
        if let Some(args) = self.extract_kv_args(entry) {
            Some(args)
        } else {
            self.extract_list_args(entry)
        }
    }

    fn extract_list_args(&self, entry: &Entry) -> Option<ParamKey> {
        let args = entry.input().args();
        match args {
            Some(args) => {
                let mut idx = self.rule.param_index;
                if idx < 0 {
                    idx += args.len() as isize;
                }
                if idx < 0 {
                    logging::debug!(
                        "[extract_args] The param index of the parameter flow controller is invalid, args: {:?}, param_index: {}",
                        args,
                        self.param_index()
                    );
                    None
                } else if idx as usize >= args.len() {
                    logging::debug!(
                        "[extract_args] The argument at the index doesn't exist, args: {:?}, param_index: {}",
                        args,
                        self.param_index()
                    );
                    None
                } else {
                    Some(args[idx as usize].clone())
                }
            }
            None => None,
        }
    }

    fn extract_kv_args(&self, entry: &Entry) -> Option<ParamKey> {
        let attachments = entry.input().attachments();
        match attachments {
            Some(attachments) => {
                let key = self.rule.param_key.trim();
                if key.is_empty() {
                    None
                } else {
                    attachments.get(key).cloned()
                }
            }
            None => None,
        }
    }
}
