use super::{ClusterNode, DefaultNode, EntranceNode};
use crate::{
    base::{DEFAULT_MAX_RESOURCE_AMOUNT, TOTAL_INBOUND_RESOURCE_NAME},
    logging,
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type ClusterNodeMap = HashMap<String, Arc<ClusterNode>>;
// keyed by (context name, resource name)
type DefaultNodeMap = HashMap<(String, String), Arc<DefaultNode>>;
type EntranceNodeMap = HashMap<String, Arc<EntranceNode>>;

lazy_static! {
    /// Aggregate of all inbound traffic of the process.
    pub static ref INBOUND_NODE: Arc<ClusterNode> =
        Arc::new(ClusterNode::new(TOTAL_INBOUND_RESOURCE_NAME.into()));
    static ref CLUSTER_NODE_MAP: RwLock<ClusterNodeMap> = RwLock::new(ClusterNodeMap::new());
    static ref DEFAULT_NODE_MAP: RwLock<DefaultNodeMap> = RwLock::new(DefaultNodeMap::new());
    static ref ENTRANCE_NODE_MAP: RwLock<EntranceNodeMap> = RwLock::new(EntranceNodeMap::new());
}

pub fn inbound_node() -> Arc<ClusterNode> {
    Arc::clone(&INBOUND_NODE)
}

pub fn get_cluster_node(res_name: &str) -> Option<Arc<ClusterNode>> {
    CLUSTER_NODE_MAP.read().unwrap().get(res_name).cloned()
}

/// All existing resource aggregates.
pub fn cluster_node_list() -> Vec<Arc<ClusterNode>> {
    CLUSTER_NODE_MAP.read().unwrap().values().cloned().collect()
}

pub fn get_or_create_cluster_node(res_name: &str) -> Arc<ClusterNode> {
    if let Some(node) = get_cluster_node(res_name) {
        return node;
    }
    let mut map = CLUSTER_NODE_MAP.write().unwrap();
    if let Some(node) = map.get(res_name) {
        return Arc::clone(node);
    }
    if map.len() >= DEFAULT_MAX_RESOURCE_AMOUNT {
        logging::warn!(
            "[get_or_create_cluster_node] Resource amount exceeds the threshold {}",
            DEFAULT_MAX_RESOURCE_AMOUNT
        );
    }
    let node = Arc::new(ClusterNode::new(res_name.into()));
    map.insert(res_name.into(), Arc::clone(&node));
    node
}

/// One `DefaultNode` per (context name, resource name); its cluster node is
/// wired at construction.
pub fn get_or_create_default_node(ctx_name: &str, res_name: &str) -> Arc<DefaultNode> {
    let key = (ctx_name.to_owned(), res_name.to_owned());
    if let Some(node) = DEFAULT_NODE_MAP.read().unwrap().get(&key) {
        return Arc::clone(node);
    }
    let cluster_node = get_or_create_cluster_node(res_name);
    let mut map = DEFAULT_NODE_MAP.write().unwrap();
    if let Some(node) = map.get(&key) {
        return Arc::clone(node);
    }
    let node = Arc::new(DefaultNode::new(res_name.into(), cluster_node));
    map.insert(key, Arc::clone(&node));
    node
}

/// A single name shares one `EntranceNode` globally.
pub fn get_or_create_entrance_node(name: &str) -> Arc<EntranceNode> {
    if let Some(node) = ENTRANCE_NODE_MAP.read().unwrap().get(name) {
        return Arc::clone(node);
    }
    let mut map = ENTRANCE_NODE_MAP.write().unwrap();
    if let Some(node) = map.get(name) {
        return Arc::clone(node);
    }
    let node = Arc::new(EntranceNode::new(name.into()));
    map.insert(name.into(), Arc::clone(&node));
    node
}

pub fn reset_node_maps() {
    CLUSTER_NODE_MAP.write().unwrap().clear();
    DEFAULT_NODE_MAP.write().unwrap().clear();
    ENTRANCE_NODE_MAP.write().unwrap().clear();
}
