use super::StatisticNode;
use crate::base::{MetricItem, MetricItemRetriever, Node, TimePredicate};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Process-wide aggregate of one resource across every context, plus the
/// per-origin breakdown used by origin-scoped rules.
#[derive(Debug, Default)]
pub struct ClusterNode {
    res_name: String,
    stat: StatisticNode,
    origin_nodes: RwLock<HashMap<String, Arc<StatisticNode>>>,
}

impl ClusterNode {
    pub fn new(res_name: String) -> Self {
        ClusterNode {
            res_name,
            stat: StatisticNode::new(),
            origin_nodes: RwLock::new(HashMap::new()),
        }
    }

    pub fn res_name(&self) -> &String {
        &self.res_name
    }

    /// One `StatisticNode` per distinct origin, created on first sight.
    pub fn get_or_create_origin_node(&self, origin: &str) -> Arc<StatisticNode> {
        if let Some(node) = self.origin_nodes.read().unwrap().get(origin) {
            return Arc::clone(node);
        }
        let mut origin_nodes = self.origin_nodes.write().unwrap();
        // double check under the write lock
        if let Some(node) = origin_nodes.get(origin) {
            return Arc::clone(node);
        }
        let node = Arc::new(StatisticNode::new());
        origin_nodes.insert(origin.into(), Arc::clone(&node));
        node
    }

    pub fn origin_count(&self) -> usize {
        self.origin_nodes.read().unwrap().len()
    }
}

impl MetricItemRetriever for ClusterNode {
    fn metrics_on_condition(&self, predicate: &TimePredicate) -> Vec<MetricItem> {
        self.stat.metrics_on_condition(predicate)
    }
}

impl Node for ClusterNode {
    fn res_name(&self) -> String {
        self.res_name.clone()
    }
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
    }
    fn add_rt_and_success(&self, rt: u64, success: u32) {
        self.stat.add_rt_and_success(rt, success);
    }
    fn increase_block(&self, count: u32) {
        self.stat.increase_block(count);
    }
    fn increase_exception(&self, count: u32) {
        self.stat.increase_exception(count);
    }
    fn increase_thread_num(&self) {
        self.stat.increase_thread_num();
    }
    fn decrease_thread_num(&self) {
        self.stat.decrease_thread_num();
    }
    fn try_occupy_next(&self, now: u64, acquire_count: u32, threshold: f64) -> u64 {
        self.stat.try_occupy_next(now, acquire_count, threshold)
    }
    fn add_waiting_request(&self, future_time: u64, count: u32) {
        self.stat.add_waiting_request(future_time, count);
    }
    fn add_occupied_pass(&self, count: u32) {
        self.stat.add_occupied_pass(count);
    }
    fn waiting(&self) -> u64 {
        self.stat.waiting()
    }
    fn reset(&self) {
        self.stat.reset();
    }
}
