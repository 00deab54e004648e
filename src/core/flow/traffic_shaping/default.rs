use super::{Calculator, Checker, Rule};
use crate::base::{BlockType, Node, TokenResult};
use crate::flow::FlowGrade;
use crate::{config, utils};
use std::sync::Arc;

/// Provides the rule threshold unchanged.
#[derive(Debug)]
pub struct DirectCalculator {
    threshold: f64,
}

impl DirectCalculator {
    pub fn new(threshold: f64) -> Self {
        DirectCalculator { threshold }
    }
}

impl Calculator for DirectCalculator {
    fn calculate_allowed_threshold(&self, _node: &Arc<dyn Node>, _batch_count: u32) -> f64 {
        self.threshold
    }
}

/// Rejects immediately once the threshold is reached. Prioritized QPS
/// requests may instead pre-occupy quota of an upcoming window and pass after
/// sleeping until that window starts.
#[derive(Debug)]
pub struct RejectChecker {
    rule: Arc<Rule>,
}

impl RejectChecker {
    pub fn new(rule: Arc<Rule>) -> Self {
        RejectChecker { rule }
    }
}

impl Checker for RejectChecker {
    fn do_check(
        &self,
        node: Arc<dyn Node>,
        batch_count: u32,
        threshold: f64,
        prioritized: bool,
    ) -> TokenResult {
        let cur_count = match self.rule.grade {
            FlowGrade::Thread => node.cur_thread_num() as f64,
            FlowGrade::Qps => node.pass_qps(),
        };
        if cur_count + batch_count as f64 <= threshold {
            return TokenResult::new_pass();
        }
        if prioritized && self.rule.grade == FlowGrade::Qps {
            let now = utils::curr_time_millis();
            let wait_in_ms = node.try_occupy_next(now, batch_count, threshold);
            if wait_in_ms < config::occupy_timeout_ms() {
                node.add_waiting_request(now + wait_in_ms, batch_count);
                node.add_occupied_pass(batch_count);
                return TokenResult::new_should_wait(wait_in_ms * 1_000_000);
            }
        }
        TokenResult::new_blocked_with_cause(
            BlockType::Flow,
            "flow reject check blocked".into(),
            self.rule.clone(),
            Arc::new(cur_count),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::MockNode;

    fn qps_rule(threshold: f64) -> Arc<Rule> {
        Arc::new(Rule {
            resource: "abc".into(),
            threshold,
            ..Default::default()
        })
    }

    #[test]
    fn reject_below_and_above_threshold() {
        let checker = RejectChecker::new(qps_rule(10.0));

        let mut node = MockNode::new();
        node.expect_pass_qps().return_const(9.0);
        let node: Arc<dyn Node> = Arc::new(node);
        assert!(checker.do_check(Arc::clone(&node), 1, 10.0, false).is_pass());

        let mut node = MockNode::new();
        node.expect_pass_qps().return_const(10.0);
        let node: Arc<dyn Node> = Arc::new(node);
        assert!(checker.do_check(node, 1, 10.0, false).is_blocked());
    }

    #[test]
    fn thread_grade_reads_concurrency() {
        let rule = Arc::new(Rule {
            resource: "abc".into(),
            grade: FlowGrade::Thread,
            threshold: 8.0,
            ..Default::default()
        });
        let checker = RejectChecker::new(rule);
        let mut node = MockNode::new();
        node.expect_cur_thread_num().return_const(8u32);
        let node: Arc<dyn Node> = Arc::new(node);
        assert!(checker.do_check(node, 1, 8.0, false).is_blocked());
    }

    #[test]
    fn prioritized_occupies_next_window() {
        let checker = RejectChecker::new(qps_rule(10.0));
        let mut node = MockNode::new();
        node.expect_pass_qps().return_const(10.0);
        node.expect_try_occupy_next().return_const(120u64);
        node.expect_add_waiting_request().times(1).return_const(());
        node.expect_add_occupied_pass().times(1).return_const(());
        let node: Arc<dyn Node> = Arc::new(node);
        let r = checker.do_check(node, 1, 10.0, true);
        assert!(r.is_wait());
        assert_eq!(r.nanos_to_wait(), 120 * 1_000_000);
    }

    #[test]
    fn prioritized_rejected_when_occupation_times_out() {
        let checker = RejectChecker::new(qps_rule(10.0));
        let mut node = MockNode::new();
        node.expect_pass_qps().return_const(10.0);
        node.expect_try_occupy_next()
            .return_const(config::occupy_timeout_ms());
        let node: Arc<dyn Node> = Arc::new(node);
        assert!(checker.do_check(node, 1, 10.0, true).is_blocked());
    }
}
