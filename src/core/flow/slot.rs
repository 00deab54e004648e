use super::*;
use crate::base::{
    BaseSlot, BlockType, Entry, Node, RuleCheckSlot, TokenResult, LIMIT_APP_DEFAULT,
    LIMIT_APP_OTHER,
};
use crate::cluster::{self, TokenResultStatus};
use crate::{logging, stat, utils};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 3000;

/// The rule-check slot for flow control.
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
        let res = entry.resource().name().clone();
        let batch_count = entry.input().batch_count();
        let prioritized = entry.input().prioritized();
        let tcs = get_traffic_controller_list_for(&res);
        for tc in tcs {
            let r = if tc.rule().cluster_mode {
                pass_cluster_check(&tc, entry, batch_count, prioritized)
            } else {
                pass_local_check(&tc, entry, batch_count, prioritized)
            };
            match r {
                TokenResult::Pass => {}
                TokenResult::Blocked(_) => {
                    entry.set_result(r);
                    return entry.result().clone();
                }
                TokenResult::Wait(nanos_to_wait) => {
                    if tc.rule().control_strategy == ControlStrategy::Reject {
                        // reject-mode waits come from the occupation
                        // protocol: the pass is already booked in a future
                        // window, the statistic slot must not book it again
                        entry.set_pass_pre_occupied(true);
                    }
                    utils::sleep_for_ns(nanos_to_wait);
                }
            }
        }
        entry.result().clone()
    }
}

fn pass_local_check(
    tc: &Arc<Controller>,
    entry: &Entry,
    batch_count: u32,
    prioritized: bool,
) -> TokenResult {
    match select_node_by_requester_and_strategy(tc.rule(), entry) {
        Some(node) => tc.perform_checking(node, batch_count, prioritized),
        // a rule with no node to read is not active for this call
        None => TokenResult::new_pass(),
    }
}

fn pass_cluster_check(
    tc: &Arc<Controller>,
    entry: &Entry,
    batch_count: u32,
    prioritized: bool,
) -> TokenResult {
    let service = cluster::get_token_service();
    match service {
        None => fallback_to_local_or_pass(tc, entry, batch_count, prioritized),
        Some(service) => {
            let flow_id = tc.rule().cluster_config.flow_id;
            let result = service.request_token(flow_id, batch_count, prioritized);
            match result.status {
                TokenResultStatus::Ok => TokenResult::new_pass(),
                TokenResultStatus::ShouldWait => {
                    // wait for the server-granted slot, then proceed
                    if result.wait_in_ms > 0 {
                        utils::sleep_for_ms(result.wait_in_ms as u64);
                    }
                    TokenResult::new_pass()
                }
                TokenResultStatus::Blocked => TokenResult::new_blocked_with_cause(
                    BlockType::Flow,
                    "flow cluster check blocked".into(),
                    tc.rule().clone(),
                    Arc::new(result.remaining),
                ),
                TokenResultStatus::BadRequest
                | TokenResultStatus::NoRuleExists
                | TokenResultStatus::Fail
                | TokenResultStatus::TooManyRequest => {
                    logging::FREQUENT_ERROR_ONCE.call_once(|| {
                        logging::warn!(
                            "[FlowSlot] Cluster token request degraded, status {:?}, rule {:?}",
                            result.status,
                            tc.rule()
                        );
                    });
                    fallback_to_local_or_pass(tc, entry, batch_count, prioritized)
                }
            }
        }
    }
}

fn fallback_to_local_or_pass(
    tc: &Arc<Controller>,
    entry: &Entry,
    batch_count: u32,
    prioritized: bool,
) -> TokenResult {
    if tc.rule().cluster_config.fallback_to_local_when_fail {
        pass_local_check(tc, entry, batch_count, prioritized)
    } else {
        // the rule stays inactive rather than rejecting on infrastructure
        // failures
        TokenResult::new_pass()
    }
}

fn filter_origin(origin: &str) -> bool {
    // an origin cannot be one of the reserved selector words
    origin != LIMIT_APP_DEFAULT && origin != LIMIT_APP_OTHER
}

fn select_reference_node(rule: &Arc<Rule>, entry: &Entry) -> Option<Arc<dyn Node>> {
    match rule.relation_strategy {
        RelationStrategy::Associated => stat::get_cluster_node(&rule.ref_resource)
            .map(|node| node as Arc<dyn Node>),
        RelationStrategy::Chain => {
            let ctx = entry.context().read().unwrap();
            if &rule.ref_resource == ctx.name() {
                entry.cur_node()
            } else {
                None
            }
        }
        RelationStrategy::Current => None,
    }
}

/// Chooses the statistic node the rule reads, driven by
/// `(limit_app, relation strategy, origin)`.
pub(crate) fn select_node_by_requester_and_strategy(
    rule: &Arc<Rule>,
    entry: &Entry,
) -> Option<Arc<dyn Node>> {
    let origin = entry.context().read().unwrap().origin().clone();
    if rule.limit_app == origin && filter_origin(&origin) {
        if rule.relation_strategy == RelationStrategy::Current {
            // the rule names this origin: read the origin's statistics
            return entry.origin_node();
        }
        select_reference_node(rule, entry)
    } else if rule.limit_app == LIMIT_APP_DEFAULT {
        if rule.relation_strategy == RelationStrategy::Current {
            // every origin together: read the resource aggregate
            return stat::get_cluster_node(entry.resource().name())
                .map(|node| node as Arc<dyn Node>);
        }
        select_reference_node(rule, entry)
    } else if rule.limit_app == LIMIT_APP_OTHER
        && is_other_origin(&origin, entry.resource().name())
    {
        if rule.relation_strategy == RelationStrategy::Current {
            return entry.origin_node();
        }
        select_reference_node(rule, entry)
    } else {
        None
    }
}
