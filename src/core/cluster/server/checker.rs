use super::{config, rule_manager};
use crate::base::{Node, ParamKey};
use crate::cluster::ClusterTokenResult;
use crate::flow::{ClusterThresholdType, Rule};
use crate::{config as global_config, utils};
use std::sync::Arc;

fn calc_global_threshold(rule: &Arc<Rule>) -> f64 {
    let count = rule.threshold;
    match rule.cluster_config.threshold_type {
        ClusterThresholdType::Global => count,
        ClusterThresholdType::AvgLocal => {
            let connected = rule_manager::connected_count_for_rule(rule.cluster_config.flow_id);
            count * connected as f64
        }
    }
}

/// Server-side decision for one flow token request; owns the canonical
/// counter of the rule.
pub(crate) fn acquire_cluster_token(
    rule: &Arc<Rule>,
    acquire_count: u32,
    prioritized: bool,
) -> ClusterTokenResult {
    let metric = match rule_manager::get_metric(rule.cluster_config.flow_id) {
        Some(metric) => metric,
        None => return ClusterTokenResult::new(crate::cluster::TokenResultStatus::Fail),
    };
    let latest_qps = metric.pass_qps();
    let global_threshold = calc_global_threshold(rule) * config::exceed_count();
    let next_remaining = global_threshold - latest_qps - acquire_count as f64;

    if next_remaining >= 0.0 {
        metric.add_pass_request(acquire_count);
        if prioritized {
            metric.add_occupied_pass(acquire_count);
        }
        return ClusterTokenResult::ok(next_remaining as i32);
    }
    if prioritized {
        // try to reserve an upcoming window, bounded by the occupy ratio
        let occupy_avg = metric.waiting() as f64;
        if occupy_avg <= config::max_occupy_ratio() * global_threshold {
            let now = utils::curr_time_millis();
            let wait_in_ms = metric.try_occupy_next(now, acquire_count, global_threshold);
            if wait_in_ms < global_config::occupy_timeout_ms() {
                metric.add_waiting_request(now + wait_in_ms, acquire_count);
                metric.add_occupied_pass(acquire_count);
                return ClusterTokenResult::should_wait(wait_in_ms as u32);
            }
        }
    }
    metric.increase_block(acquire_count);
    ClusterTokenResult::blocked()
}

/// Server-side decision for one parameter token request: every value must
/// have quota, any exhausted one rejects the whole batch.
pub(crate) fn acquire_cluster_param_token(
    flow_id: u64,
    acquire_count: u32,
    params: Vec<ParamKey>,
) -> ClusterTokenResult {
    let controller = match rule_manager::get_param_controller(flow_id) {
        Some(controller) => controller,
        None => return ClusterTokenResult::new(crate::cluster::TokenResultStatus::Fail),
    };
    for param in params {
        if !controller.perform_checking(param, acquire_count).is_pass() {
            return ClusterTokenResult::blocked();
        }
    }
    ClusterTokenResult::ok(0)
}
