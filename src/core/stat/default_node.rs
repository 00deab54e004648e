use super::{ClusterNode, StatisticNode};
use crate::base::Node;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Statistics of one resource within one context, forming the invocation
/// tree: nested entries become children of this node. Every write is
/// mirrored to the process-wide `ClusterNode` of the same resource.
#[derive(Debug)]
pub struct DefaultNode {
    res_name: String,
    stat: StatisticNode,
    cluster_node: Arc<ClusterNode>,
    /// children keyed by resource name; nested guarded calls land here
    children: RwLock<HashMap<String, Arc<dyn Node>>>,
}

impl DefaultNode {
    pub fn new(res_name: String, cluster_node: Arc<ClusterNode>) -> Self {
        DefaultNode {
            res_name,
            stat: StatisticNode::new(),
            cluster_node,
            children: RwLock::new(HashMap::new()),
        }
    }

    pub fn res_name(&self) -> &String {
        &self.res_name
    }

    pub fn cluster_node(&self) -> &Arc<ClusterNode> {
        &self.cluster_node
    }
}

impl Node for DefaultNode {
    fn pass_qps(&self) -> f64 {
        self.stat.pass_qps()
    }
    fn block_qps(&self) -> f64 {
        self.stat.block_qps()
    }
    fn success_qps(&self) -> f64 {
        self.stat.success_qps()
    }
    fn exception_qps(&self) -> f64 {
        self.stat.exception_qps()
    }
    fn occupied_pass_qps(&self) -> f64 {
        self.stat.occupied_pass_qps()
    }
    fn previous_pass_qps(&self) -> f64 {
        self.stat.previous_pass_qps()
    }
    fn max_success_qps(&self) -> f64 {
        self.stat.max_success_qps()
    }
    fn avg_rt(&self) -> f64 {
        self.stat.avg_rt()
    }
    fn min_rt(&self) -> f64 {
        self.stat.min_rt()
    }
    fn cur_thread_num(&self) -> u32 {
        self.stat.cur_thread_num()
    }
    fn total_pass(&self) -> u64 {
        self.stat.total_pass()
    }
    fn total_success(&self) -> u64 {
        self.stat.total_success()
    }
    fn total_block(&self) -> u64 {
        self.stat.total_block()
    }
    fn total_exception(&self) -> u64 {
        self.stat.total_exception()
    }

    fn add_pass_request(&self, count: u32) {
        self.stat.add_pass_request(count);
        self.cluster_node.add_pass_request(count);
    }

    fn add_rt_and_success(&self, rt: u64, success: u32) {
        self.stat.add_rt_and_success(rt, success);
        self.cluster_node.add_rt_and_success(rt, success);
    }

    fn increase_block(&self, count: u32) {
        self.stat.increase_block(count);
        self.cluster_node.increase_block(count);
    }

    fn increase_exception(&self, count: u32) {
        self.stat.increase_exception(count);
        self.cluster_node.increase_exception(count);
    }

    fn increase_thread_num(&self) {
        self.stat.increase_thread_num();
        self.cluster_node.increase_thread_num();
    }

    fn decrease_thread_num(&self) {
        self.stat.decrease_thread_num();
        self.cluster_node.decrease_thread_num();
    }

    fn try_occupy_next(&self, now: u64, acquire_count: u32, threshold: f64) -> u64 {
        self.stat.try_occupy_next(now, acquire_count, threshold)
    }

    fn add_waiting_request(&self, future_time: u64, count: u32) {
        self.stat.add_waiting_request(future_time, count);
        self.cluster_node.add_waiting_request(future_time, count);
    }

    fn add_occupied_pass(&self, count: u32) {
        self.stat.add_occupied_pass(count);
        self.cluster_node.add_occupied_pass(count);
    }

    fn waiting(&self) -> u64 {
        self.stat.waiting()
    }

    fn res_name(&self) -> String {
        self.res_name.clone()
    }

    fn add_child(&self, child: Arc<dyn Node>) {
        let mut children = self.children.write().unwrap();
        children.entry(child.res_name()).or_insert(child);
    }

    fn child_list(&self) -> Vec<Arc<dyn Node>> {
        self.children.read().unwrap().values().cloned().collect()
    }

    fn reset(&self) {
        self.stat.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn writes_mirror_to_cluster_node() {
        let cn = Arc::new(ClusterNode::new("abc".into()));
        let dn = DefaultNode::new("abc".into(), Arc::clone(&cn));
        dn.add_pass_request(4);
        dn.increase_block(2);
        dn.add_rt_and_success(40, 4);
        assert!((dn.pass_qps() - 4.0).abs() < f64::EPSILON);
        assert!((cn.pass_qps() - 4.0).abs() < f64::EPSILON);
        assert!((cn.block_qps() - 2.0).abs() < f64::EPSILON);
        assert!((cn.avg_rt() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn children_deduplicate() {
        let cn = Arc::new(ClusterNode::new("abc".into()));
        let dn = DefaultNode::new("abc".into(), cn);
        let child_cn = Arc::new(ClusterNode::new("child".into()));
        let child: Arc<dyn Node> = Arc::new(DefaultNode::new("child".into(), child_cn));
        dn.add_child(Arc::clone(&child));
        dn.add_child(child);
        assert_eq!(dn.child_list().len(), 1);
    }
}
