use super::get_or_create_default_node;
use crate::base::{BaseSlot, Entry, Node, StatPrepareSlot};
use lazy_static::lazy_static;
use std::sync::Arc;

const PREPARE_SLOT_ORDER: u32 = 1000;

lazy_static! {
    pub static ref DEFAULT_NODE_SELECTOR_SLOT: Arc<NodeSelectorSlot> =
        Arc::new(NodeSelectorSlot {});
}

pub fn default_node_selector_slot() -> Arc<NodeSelectorSlot> {
    Arc::clone(&DEFAULT_NODE_SELECTOR_SLOT)
}

/// Resolves the `DefaultNode` of `(context name, resource)` and hangs it into
/// the invocation tree: below the previous entry's node when the call is
/// nested, below the context's entrance node otherwise.
pub struct NodeSelectorSlot {}

impl BaseSlot for NodeSelectorSlot {
    fn order(&self) -> u32 {
        PREPARE_SLOT_ORDER
    }
}

impl StatPrepareSlot for NodeSelectorSlot {
    fn prepare(&self, entry: &mut Entry) {
        let (ctx_name, parent, entrance) = {
            let ctx = entry.context().read().unwrap();
            (
                ctx.name().clone(),
                ctx.parent_entry().cloned(),
                ctx.entrance_node(),
            )
        };
        let node = get_or_create_default_node(&ctx_name, entry.resource().name());

        let mut attached = false;
        if let Some(parent) = parent.and_then(|weak| weak.upgrade()) {
            if let Some(parent_node) = parent.read().unwrap().cur_node() {
                parent_node.add_child(Arc::clone(&node) as Arc<dyn Node>);
                attached = true;
            }
        }
        if !attached {
            if let Some(entrance) = entrance {
                entrance.add_child(Arc::clone(&node) as Arc<dyn Node>);
            }
        }
        entry.set_cur_node(node);
    }
}
