use super::StatisticNode;
use crate::base::Node;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Root of one invocation tree. Every context entered with the same name
/// shares one entrance node; its read aggregations sum over the per-context
/// nodes attached below it.
#[derive(Debug)]
pub struct EntranceNode {
    name: String,
    stat: StatisticNode,
    children: RwLock<HashMap<String, Arc<dyn Node>>>,
}

impl EntranceNode {
    pub fn new(name: String) -> Self {
        EntranceNode {
            name,
            stat: StatisticNode::new(),
            children: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    fn sum_children(&self, f: impl Fn(&Arc<dyn Node>) -> f64) -> f64 {
        let mut res = 0.0;
        for child in self.children.read().unwrap().values() {
            res += f(child);
        }
        res
    }

    fn sum_children_u64(&self, f: impl Fn(&Arc<dyn Node>) -> u64) -> u64 {
        let mut res = 0;
        for child in self.children.read().unwrap().values() {
            res += f(child);
        }
        res
    }
}

impl Node for EntranceNode {
    fn res_name(&self) -> String {
        self.name.clone()
    }

    fn pass_qps(&self) -> f64 {
        self.sum_children(|n| n.pass_qps())
    }

    fn block_qps(&self) -> f64 {
        self.sum_children(|n| n.block_qps())
    }

    fn success_qps(&self) -> f64 {
        self.sum_children(|n| n.success_qps())
    }

    fn exception_qps(&self) -> f64 {
        self.sum_children(|n| n.exception_qps())
    }

    fn occupied_pass_qps(&self) -> f64 {
        self.sum_children(|n| n.occupied_pass_qps())
    }

    fn previous_pass_qps(&self) -> f64 {
        self.sum_children(|n| n.previous_pass_qps())
    }

    fn max_success_qps(&self) -> f64 {
        self.sum_children(|n| n.max_success_qps())
    }

    /// success-weighted average over the children
    fn avg_rt(&self) -> f64 {
        let mut rt = 0.0;
        let mut total = 0.0;
        for child in self.children.read().unwrap().values() {
            let success = child.success_qps();
            rt += child.avg_rt() * success;
            total += success;
        }
        if total > 0.0 {
            rt / total
        } else {
            0.0
        }
    }

    fn min_rt(&self) -> f64 {
        let mut res = f64::MAX;
        for child in self.children.read().unwrap().values() {
            res = res.min(child.min_rt());
        }
        if res == f64::MAX {
            0.0
        } else {
            res
        }
    }

    fn cur_thread_num(&self) -> u32 {
        let mut res = 0;
        for child in self.children.read().unwrap().values() {
            res += child.cur_thread_num();
        }
        res
    }

    fn total_pass(&self) -> u64 {
        self.sum_children_u64(|n| n.total_pass())
    }

    fn total_success(&self) -> u64 {
        self.sum_children_u64(|n| n.total_success())
    }

    fn total_block(&self) -> u64 {
        self.sum_children_u64(|n| n.total_block())
    }

    fn total_exception(&self) -> u64 {
        self.sum_children_u64(|n| n.total_exception())
    }

    // writes record on the entrance's own statistic, they do not touch the
    // children
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
    use crate::stat::{ClusterNode, DefaultNode};

    #[test]
    fn aggregates_children() {
        let entrance = EntranceNode::new("web".into());
        let cn1 = Arc::new(ClusterNode::new("r1".into()));
        let cn2 = Arc::new(ClusterNode::new("r2".into()));
        let d1 = Arc::new(DefaultNode::new("r1".into(), cn1));
        let d2 = Arc::new(DefaultNode::new("r2".into(), cn2));
        entrance.add_child(Arc::clone(&d1) as Arc<dyn Node>);
        entrance.add_child(Arc::clone(&d2) as Arc<dyn Node>);

        d1.add_pass_request(3);
        d2.add_pass_request(4);
        d2.increase_block(2);

        assert!((entrance.pass_qps() - 7.0).abs() < f64::EPSILON);
        assert!((entrance.block_qps() - 2.0).abs() < f64::EPSILON);
        assert_eq!(entrance.total_pass(), 7);
        assert_eq!(entrance.child_list().len(), 2);
    }
}
