use super::get_or_create_cluster_node;
use crate::base::{BaseSlot, Entry, Node, StatPrepareSlot};
use lazy_static::lazy_static;
use std::sync::Arc;

const PREPARE_SLOT_ORDER: u32 = 2000;

lazy_static! {
    pub static ref DEFAULT_CLUSTER_BUILDER_SLOT: Arc<ClusterBuilderSlot> =
        Arc::new(ClusterBuilderSlot {});
}

pub fn default_cluster_builder_slot() -> Arc<ClusterBuilderSlot> {
    Arc::clone(&DEFAULT_CLUSTER_BUILDER_SLOT)
}

/// Ensures the resource-global `ClusterNode` exists (the node selector wires
/// it into the `DefaultNode` at construction) and, when the context carries
/// an origin, resolves the per-origin statistic node.
pub struct ClusterBuilderSlot {}

impl BaseSlot for ClusterBuilderSlot {
    fn order(&self) -> u32 {
        PREPARE_SLOT_ORDER
    }
}

impl StatPrepareSlot for ClusterBuilderSlot {
    fn prepare(&self, entry: &mut Entry) {
        let origin = entry.context().read().unwrap().origin().clone();
        let cluster_node = get_or_create_cluster_node(entry.resource().name());
        if !origin.is_empty() {
            let origin_node = cluster_node.get_or_create_origin_node(&origin);
            entry.set_origin_node(origin_node as Arc<dyn Node>);
        }
    }
}
