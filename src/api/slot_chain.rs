use crate::{authority, base::SlotChain, degrade, flow, param_flow, stat, system};
use lazy_static::lazy_static;
use std::sync::Arc;

lazy_static! {
    /// The process-wide slot chain every entry runs through, in the fixed
    /// registration order: node selector and cluster builder prepare the
    /// statistic nodes; authority, system, flow, degrade and parameter flow
    /// gate the call; the statistic slots record the outcome.
    pub static ref GLOBAL_SLOT_CHAIN: Arc<SlotChain> = {
        let mut sc = SlotChain::new();

        sc.add_stat_prepare_slot(stat::default_node_selector_slot()); // 1000
        sc.add_stat_prepare_slot(stat::default_cluster_builder_slot()); // 2000

        sc.add_rule_check_slot(authority::default_slot()); // 1000
        sc.add_rule_check_slot(system::default_slot()); // 2000
        sc.add_rule_check_slot(flow::default_slot()); // 3000
        sc.add_rule_check_slot(degrade::default_slot()); // 4000
        sc.add_rule_check_slot(param_flow::default_slot()); // 5000

        sc.add_stat_slot(stat::default_resource_stat_slot()); // 1000
        sc.add_stat_slot(param_flow::default_concurrency_stat_slot()); // 2000
        Arc::new(sc)
    };
}

pub fn global_slot_chain() -> Arc<SlotChain> {
    GLOBAL_SLOT_CHAIN.clone()
}
