use super::{BlockError, Entry, TokenResult, SLOT_INIT};
use crate::logging;
use crate::utils::AsAny;
use std::any::Any;
use std::sync::Arc;

/// trait `PartialOrd` is not object safe.
/// The chain sorts the slots of each stage by ascending `order()` value.
pub trait BaseSlot: Any + AsAny + Sync + Send {
    /// order returns the sort value of the slot.
    fn order(&self) -> u32 {
        0
    }
}

/// StatPrepareSlot is responsible for preparation before the statistic and the
/// rule checks, e.g. resolving the statistic nodes of the entered resource.
/// The results of preparation are stored on the entry.
/// All StatPrepareSlots execute in sequence. A prepare slot must not panic.
pub trait StatPrepareSlot: BaseSlot {
    fn prepare(&self, _entry: &mut Entry) {}
}

/// RuleCheckSlot is a rule based checking strategy.
/// Every rule checker implements this trait; returning a blocked result
/// breaks off the pipeline.
pub trait RuleCheckSlot: BaseSlot {
    fn check(&self, entry: &mut Entry) -> TokenResult {
        entry.result().clone()
    }
}

/// StatSlot is responsible for recording the outcome of the rule checks.
/// The runtime fires the slot after the checking stage finished, so the
/// statistics observe what the downstream decided.
pub trait StatSlot: BaseSlot {
    /// on_entry_pass is invoked when the rule-check slots all passed.
    fn on_entry_pass(&self, _entry: &Entry) {}
    /// on_entry_blocked is invoked when a rule-check slot rejected the call.
    /// The block error introduces the block detail.
    fn on_entry_blocked(&self, _entry: &Entry, _block_error: BlockError) {}
    /// on_completed is invoked when the entry exits.
    /// Blocked entries never complete, so this fires only for passed ones.
    fn on_completed(&self, _entry: &mut Entry) {}
}

/// SlotChain holds the ordered pipeline stages every guarded call runs
/// through. One chain instance is shared process-wide.
pub struct SlotChain {
    /// stat_pres is in ascending order by StatPrepareSlot.order() value.
    pub(self) stat_pres: Vec<Arc<dyn StatPrepareSlot>>,
    /// rule_checks is in ascending order by RuleCheckSlot.order() value.
    pub(self) rule_checks: Vec<Arc<dyn RuleCheckSlot>>,
    /// stats is in ascending order by StatSlot.order() value.
    pub(self) stats: Vec<Arc<dyn StatSlot>>,
}

impl Default for SlotChain {
    fn default() -> Self {
        Self {
            stat_pres: Vec::with_capacity(SLOT_INIT),
            rule_checks: Vec::with_capacity(SLOT_INIT),
            stats: Vec::with_capacity(SLOT_INIT),
        }
    }
}

impl SlotChain {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_stat_prepare_slot(&mut self, s: Arc<dyn StatPrepareSlot>) {
        self.stat_pres.push(s);
        self.stat_pres.sort_unstable_by_key(|a| a.order());
    }

    pub fn add_rule_check_slot(&mut self, s: Arc<dyn RuleCheckSlot>) {
        self.rule_checks.push(s);
        self.rule_checks.sort_unstable_by_key(|a| a.order());
    }

    pub fn add_stat_slot(&mut self, s: Arc<dyn StatSlot>) {
        self.stats.push(s);
        self.stats.sort_unstable_by_key(|a| a.order());
    }

    /// The entrance of the slot chain. Returns the admission result.
    pub fn entry(&self, entry: &mut Entry) -> TokenResult {
        // execute prepare slots
        for s in &self.stat_pres {
            s.prepare(entry);
        }

        // execute rule based checking slots
        entry.reset_result_to_pass();
        for s in &self.rule_checks {
            let res = s.check(entry);
            if res.is_blocked() {
                entry.set_result(res.clone());
                break;
            }
        }

        // execute statistic slots
        if entry.result().is_pass() {
            for s in &self.stats {
                s.on_entry_pass(entry);
            }
        } else if entry.result().is_blocked() {
            // the block error cannot be none here
            let block_err = entry.result().block_err().unwrap();
            for s in &self.stats {
                s.on_entry_blocked(entry, block_err.clone());
            }
        }
        entry.result().clone()
    }

    pub fn exit(&self, entry: &mut Entry) {
        if entry.is_blocked() {
            return;
        }
        if !entry.result().is_pass() && !entry.result().is_wait() {
            logging::error!("SlotChain.exit() with an unexpected result");
            return;
        }
        // on_completed is called only when the entry passed
        for s in &self.stats {
            s.on_completed(entry);
        }
    }
}

#[cfg(test)]
pub(crate) use test::aggregation::{MockRuleCheckSlot, MockStatPrepareSlot, MockStatSlot};
