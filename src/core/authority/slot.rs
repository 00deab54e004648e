use super::get_rules_of_resource;
use crate::base::{BaseSlot, BlockType, Entry, RuleCheckSlot, TokenResult};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 1000;

/// The rule-check slot for origin white/black lists.
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
        let origin = entry.context().read().unwrap().origin().clone();
        for rule in get_rules_of_resource(&res) {
            if !rule.pass_check(&origin) {
                entry.set_result(TokenResult::new_blocked_with_cause(
                    BlockType::Authority,
                    "authority check blocked".into(),
                    rule,
                    Arc::new(origin.clone()),
                ));
                break;
            }
        }
        entry.result().clone()
    }
}
