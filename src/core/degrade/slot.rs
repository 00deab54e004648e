use super::get_breakers_of_resource;
use crate::base::{BaseSlot, BlockType, Entry, RuleCheckSlot, TokenResult};
use lazy_static::lazy_static;
use std::sync::Arc;

const RULE_CHECK_SLOT_ORDER: u32 = 4000;

/// The rule-check slot for circuit breaking.
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
        if res.is_empty() {
            return entry.result().clone();
        }
        for breaker in get_breakers_of_resource(&res) {
            if !breaker.try_pass() {
                entry.set_result(TokenResult::new_blocked_with_cause(
                    BlockType::Degrade,
                    "degrade check blocked".into(),
                    breaker.rule().clone(),
                    Arc::new(breaker.rule().threshold),
                ));
                break;
            }
        }
        entry.result().clone()
    }
}
