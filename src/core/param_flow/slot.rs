use super::*;
use crate::base::{BaseSlot, BlockType, Entry, RuleCheckSlot, TokenResult};
use crate::cluster::{self, TokenResultStatus};
use crate::{logging, utils};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 5000;

/// The rule-check slot for hot-parameter flow control.
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
        for tc in get_traffic_controller_list_for(&res) {
            let arg = match tc.extract_args(entry) {
                Some(arg) => arg,
                None => continue,
            };
            let r = if tc.rule().cluster_mode && tc.rule().metric_type == MetricType::Qps {
                pass_cluster_check(&tc, arg, batch_count)
            } else {
                tc.perform_checking(arg, batch_count)
            };
            match r {
                TokenResult::Pass => {}
                TokenResult::Blocked(_) => {
                    entry.set_result(r);
                    return entry.result().clone();
                }
                TokenResult::Wait(nanos_to_wait) => {
                    utils::sleep_for_ns(nanos_to_wait);
                }
            }
        }
        entry.result().clone()
    }
}

fn pass_cluster_check(tc: &Arc<Controller>, arg: String, batch_count: u32) -> TokenResult {
    let service = cluster::get_token_service();
    match service {
        None => fallback_to_local_or_pass(tc, arg, batch_count),
        Some(service) => {
            let flow_id = tc.rule().cluster_config.flow_id;
            let result = service.request_param_token(flow_id, batch_count, vec![arg.clone()]);
            match result.status {
                TokenResultStatus::Ok => TokenResult::new_pass(),
                TokenResultStatus::Blocked => TokenResult::new_blocked_with_cause(
                    BlockType::ParamFlow,
                    "parameter cluster check blocked".into(),
                    tc.rule().clone(),
                    Arc::new(arg),
                ),
                _ => {
                    logging::FREQUENT_ERROR_ONCE.call_once(|| {
                        logging::warn!(
                            "[ParamFlowSlot] Cluster param token request degraded, status {:?}, rule {:?}",
                            result.status,
                            tc.rule()
                        );
                    });
                    fallback_to_local_or_pass(tc, arg, batch_count)
                }
            }
        }
    }
}

fn fallback_to_local_or_pass(tc: &Arc<Controller>, arg: String, batch_count: u32) -> TokenResult {
    if tc.rule().cluster_config.fallback_to_local_when_fail {
        tc.perform_checking(arg, batch_count)
    } else {
        TokenResult::new_pass()
    }
}
