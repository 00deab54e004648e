use crate::stat::StatisticNode;
use crate::{flow, logging, param_flow};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref FLOW_RULES: RwLock<HashMap<u64, Arc<flow::Rule>>> = RwLock::new(HashMap::new());
    static ref PARAM_RULES: RwLock<HashMap<u64, Arc<param_flow::Rule>>> =
        RwLock::new(HashMap::new());
    static ref NAMESPACE_MAP: RwLock<HashMap<u64, String>> = RwLock::new(HashMap::new());
    /// connected client count per namespace; scales `AvgLocal` thresholds
    static ref CONNECTED_COUNT: RwLock<HashMap<String, u32>> = RwLock::new(HashMap::new());
    /// canonical per-rule counters owned by the token server
    static ref METRIC_MAP: RwLock<HashMap<u64, Arc<StatisticNode>>> = RwLock::new(HashMap::new());
    /// server-side parameter controllers keyed by flow id
    static ref PARAM_CONTROLLER_MAP: RwLock<HashMap<u64, Arc<param_flow::Controller>>> =
        RwLock::new(HashMap::new());
}

/// Registers the cluster flow rules of a namespace on the server, replacing
/// that namespace's previous ones.
pub fn load_flow_rules(namespace: &str, rules: Vec<Arc<flow::Rule>>) {
    let mut flow_rules = FLOW_RULES.write().unwrap();
    let mut namespaces = NAMESPACE_MAP.write().unwrap();
    let mut metrics = METRIC_MAP.write().unwrap();
    let stale: Vec<u64> = namespaces
        .iter()
        .filter(|(_, ns)| ns.as_str() == namespace)
        .map(|(id, _)| *id)
        .filter(|id| flow_rules.contains_key(id))
        .collect();
    for id in stale {
        flow_rules.remove(&id);
        namespaces.remove(&id);
        metrics.remove(&id);
    }
    for rule in rules {
        let flow_id = rule.cluster_config.flow_id;
        if flow_id == 0 {
            logging::warn!(
                "[ClusterFlowRuleManager] Ignoring cluster flow rule without a flow id: {:?}",
                rule
            );
            continue;
        }
        namespaces.insert(flow_id, namespace.into());
        metrics.insert(flow_id, Arc::new(StatisticNode::new()));
        flow_rules.insert(flow_id, rule);
    }
}

/// Registers the cluster parameter flow rules of a namespace on the server.
pub fn load_param_rules(namespace: &str, rules: Vec<Arc<param_flow::Rule>>) {
    let mut param_rules = PARAM_RULES.write().unwrap();
    let mut namespaces = NAMESPACE_MAP.write().unwrap();
    let mut controllers = PARAM_CONTROLLER_MAP.write().unwrap();
    let stale: Vec<u64> = namespaces
        .iter()
        .filter(|(_, ns)| ns.as_str() == namespace)
        .map(|(id, _)| *id)
        .filter(|id| param_rules.contains_key(id))
        .collect();
    for id in stale {
        param_rules.remove(&id);
        namespaces.remove(&id);
        controllers.remove(&id);
    }
    for rule in rules {
        let flow_id = rule.cluster_config.flow_id;
        if flow_id == 0 {
            logging::warn!(
                "[ClusterParamRuleManager] Ignoring cluster parameter rule without a flow id: {:?}",
                rule
            );
            continue;
        }
        namespaces.insert(flow_id, namespace.into());
        controllers.insert(flow_id, param_flow::gen_controller_for_cluster(&rule));
        param_rules.insert(flow_id, rule);
    }
}

pub fn get_flow_rule_by_id(flow_id: u64) -> Option<Arc<flow::Rule>> {
    FLOW_RULES.read().unwrap().get(&flow_id).cloned()
}

pub fn get_param_rule_by_id(flow_id: u64) -> Option<Arc<param_flow::Rule>> {
    PARAM_RULES.read().unwrap().get(&flow_id).cloned()
}

pub fn get_namespace(flow_id: u64) -> String {
    NAMESPACE_MAP
        .read()
        .unwrap()
        .get(&flow_id)
        .cloned()
        .unwrap_or_default()
}

pub fn get_metric(flow_id: u64) -> Option<Arc<StatisticNode>> {
    METRIC_MAP.read().unwrap().get(&flow_id).cloned()
}

pub(crate) fn get_param_controller(flow_id: u64) -> Option<Arc<param_flow::Controller>> {
    PARAM_CONTROLLER_MAP.read().unwrap().get(&flow_id).cloned()
}

/// Declares how many clients are connected for a namespace; `AvgLocal`
/// thresholds scale with it.
pub fn set_connected_count(namespace: &str, count: u32) {
    CONNECTED_COUNT
        .write()
        .unwrap()
        .insert(namespace.into(), count);
}

pub fn connected_count_for_rule(flow_id: u64) -> u32 {
    let namespace = get_namespace(flow_id);
    CONNECTED_COUNT
        .read()
        .unwrap()
        .get(&namespace)
        .copied()
        .unwrap_or(1)
}

pub fn clear_server_rules() {
    FLOW_RULES.write().unwrap().clear();
    PARAM_RULES.write().unwrap().clear();
    NAMESPACE_MAP.write().unwrap().clear();
    METRIC_MAP.write().unwrap().clear();
    PARAM_CONTROLLER_MAP.write().unwrap().clear();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn load_and_lookup() {
        let rule = Arc::new(flow::Rule {
            resource: "cluster_manager_res".into(),
            threshold: 10.0,
            cluster_mode: true,
            cluster_config: flow::ClusterFlowConfig {
                flow_id: 4242,
                ..Default::default()
            },
            ..Default::default()
        });
        load_flow_rules("cluster_manager_ns", vec![rule]);
        assert!(get_flow_rule_by_id(4242).is_some());
        assert!(get_metric(4242).is_some());
        assert_eq!(get_namespace(4242), "cluster_manager_ns");
        assert_eq!(connected_count_for_rule(4242), 1);
        set_connected_count("cluster_manager_ns", 3);
        assert_eq!(connected_count_for_rule(4242), 3);
        // reloading the namespace drops the stale rule
        load_flow_rules("cluster_manager_ns", vec![]);
        assert!(get_flow_rule_by_id(4242).is_none());
    }
}
