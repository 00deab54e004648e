use super::{get_rules, AdaptiveStrategy, MetricType, Rule};
use crate::base::{
    BaseSlot, BlockType, Entry, Node, RuleCheckSlot, TokenResult, TrafficType,
};
use crate::{stat, system_metric};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 2000;

/// The rule-check slot for global inbound protection.
pub struct Slot {}

lazy_static! {
    pub static ref DEFAULT_SLOT: Arc<Slot> = Arc::new(Slot {});
}

pub fn default_slot() -> Arc<Slot> {
    DEFAULT_SLOT.clone()
}

impl BaseSlot for Slot {
    fn order(&self) -> u32 {
        RULE_CHECK_SLOT_ORDER
    }
}

impl RuleCheckSlot for Slot {
    fn check(&self, entry: &mut Entry) -> TokenResult {
        // system rules guard the inbound surface only
        if entry.resource().traffic_type() != TrafficType::Inbound {
            return entry.result().clone();
        }
        let batch_count = entry.input().batch_count();
        for rule in get_rules() {
            let (passed, snapshot) = check_rule(&rule, batch_count);
            if !passed {
                entry.set_result(TokenResult::new_blocked_with_cause(
                    BlockType::SystemFlow,
                    "system check blocked".into(),
                    rule,
                    Arc::new(snapshot),
                ));
                break;
            }
        }
        entry.result().clone()
    }
}

fn check_rule(rule: &Arc<Rule>, batch_count: u32) -> (bool, f64) {
    let inbound = stat::inbound_node();
    match rule.metric_type {
        MetricType::InboundQps => {
            let qps = inbound.pass_qps();
            (qps + batch_count as f64 <= rule.trigger_count, qps)
        }
        MetricType::Concurrency => {
            let concurrency = inbound.cur_thread_num() as f64;
            (concurrency < rule.trigger_count, concurrency)
        }
        MetricType::AvgRt => {
            let rt = inbound.avg_rt();
            (rt <= rule.trigger_count, rt)
        }
        MetricType::Load => {
            let load = system_metric::current_load();
            if load <= rule.trigger_count {
                (true, load)
            } else {
                (check_bbr(rule), load)
            }
        }
        MetricType::CpuUsage => {
            let usage = system_metric::current_cpu_usage();
            if usage <= rule.trigger_count {
                (true, usage)
            } else {
                (check_bbr(rule), usage)
            }
        }
    }
}

/// While the trigger metric is exceeded, the BBR strategy still admits
/// traffic as long as the concurrency stays within the estimated pipeline
/// capacity `max_success_qps × min_rt`.
fn check_bbr(rule: &Arc<Rule>) -> bool {
    if rule.strategy != AdaptiveStrategy::Bbr {
        return false;
    }
    let inbound = stat::inbound_node();
    let concurrency = inbound.cur_thread_num() as f64;
    let min_rt = inbound.min_rt();
    let max_success_qps = inbound.max_success_qps();
    !(concurrency > 1.0 && concurrency > max_success_qps * min_rt / 1000.0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bbr_rejects_overgrown_concurrency() {
        let rule = Arc::new(Rule {
            metric_type: MetricType::Load,
            trigger_count: 1.0,
            strategy: AdaptiveStrategy::NoAdaptive,
            ..Default::default()
        });
        // without the adaptive strategy an exceeded trigger always rejects
        assert!(!check_bbr(&rule));
    }
}
