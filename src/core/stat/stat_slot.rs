use super::inbound_node;
use crate::base::{BaseSlot, BlockError, Entry, Node, StatSlot, TrafficType};
use crate::{config, utils::curr_time_millis};
use lazy_static::lazy_static;
use std::cmp;
use std::sync::Arc;

const STAT_SLOT_ORDER: u32 = 1000;

lazy_static! {
    pub static ref DEFAULT_RESOURCE_STAT_SLOT: Arc<ResourceNodeStatSlot> =
        Arc::new(ResourceNodeStatSlot {});
}

pub fn default_resource_stat_slot() -> Arc<ResourceNodeStatSlot> {
    Arc::clone(&DEFAULT_RESOURCE_STAT_SLOT)
}

/// Records the outcome of the rule checks on the per-context node (which
/// mirrors into the resource aggregate), the origin node, and the global
/// inbound aggregate.
pub struct ResourceNodeStatSlot {}

impl ResourceNodeStatSlot {
    fn record_pass_for(&self, node: Arc<dyn Node>, count: u32) {
        node.increase_thread_num();
        node.add_pass_request(count);
    }

    fn record_block_for(&self, node: Arc<dyn Node>, count: u32) {
        node.increase_block(count);
    }

    fn record_complete_for(&self, node: Arc<dyn Node>, count: u32, round_trip: u64, erred: bool) {
        if !erred {
            node.add_rt_and_success(round_trip, count);
        }
        node.decrease_thread_num();
    }

    fn each_node(&self, entry: &Entry, f: impl Fn(Arc<dyn Node>)) {
        if let Some(node) = entry.cur_node() {
            f(node);
        }
        if let Some(node) = entry.origin_node() {
            f(node);
        }
        if entry.resource().traffic_type() == TrafficType::Inbound {
            f(inbound_node() as Arc<dyn Node>);
        }
    }
}

impl BaseSlot for ResourceNodeStatSlot {
    fn order(&self) -> u32 {
        STAT_SLOT_ORDER
    }
}

impl StatSlot for ResourceNodeStatSlot {
    fn on_entry_pass(&self, entry: &Entry) {
        let count = entry.input().batch_count();
        if entry.pass_pre_occupied() {
            // the pass was pre-paid into a future window by the occupation
            // protocol, only the concurrency moves now
            self.each_node(entry, |node| node.increase_thread_num());
        } else {
            self.each_node(entry, |node| self.record_pass_for(node, count));
        }
    }

    fn on_entry_blocked(&self, entry: &Entry, _block_error: BlockError) {
        let count = entry.input().batch_count();
        self.each_node(entry, |node| self.record_block_for(node, count));
    }

    fn on_completed(&self, entry: &mut Entry) {
        let round_trip = cmp::min(
            curr_time_millis().saturating_sub(entry.create_time()),
            config::statistic_max_rt(),
        );
        entry.set_round_trip(round_trip);
        let count = entry.input().batch_count();
        let erred = entry.get_err().is_some();
        self.each_node(entry, |node| {
            self.record_complete_for(node, count, round_trip, erred)
        });
    }
}
