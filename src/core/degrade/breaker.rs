use super::{DegradeGrade, Rule};
use crate::base::Node;
use crate::{logging, stat, utils};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

#[derive(Debug, Default)]
struct BreakerStatus {
    /// consecutive slow requests observed, `Rt` grade only
    slow_count: AtomicU64,
    tripped: AtomicBool,
}

/// Per-rule circuit breaker. A trip cuts the resource off; a one-shot reset
/// task re-arms the breaker after the rule's time window.
#[derive(Debug)]
pub struct Breaker {
    rule: Arc<Rule>,
    status: Arc<BreakerStatus>,
}

impl Breaker {
    pub fn new(rule: Arc<Rule>) -> Self {
        Breaker {
            rule,
            status: Arc::new(BreakerStatus::default()),
        }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn is_tripped(&self) -> bool {
        self.status.tripped.load(Ordering::SeqCst)
    }

    /// Decides whether the call may pass, reading the resource aggregate.
    /// While tripped and inside the time window, nothing passes.
    pub fn try_pass(&self) -> bool {
        if self.is_tripped() {
            return false;
        }
        let cluster_node = match stat::get_cluster_node(&self.rule.resource) {
            Some(node) => node,
            // nothing recorded for the resource yet
            None => return true,
        };
        match self.rule.grade {
            DegradeGrade::Rt => {
                let rt = cluster_node.avg_rt();
                if rt < self.rule.threshold {
                    self.status.slow_count.store(0, Ordering::SeqCst);
                    return true;
                }
                // trip only once enough consecutive requests were slow
                if self.status.slow_count.fetch_add(1, Ordering::SeqCst) + 1
                    < self.rule.rt_slow_request_amount as u64
                {
                    return true;
                }
            }
            DegradeGrade::ErrorRatio => {
                let exception = cluster_node.exception_qps();
                let success = cluster_node.success_qps();
                let total = cluster_node.total_qps();
                if total < self.rule.min_request_amount as f64 {
                    return true;
                }
                // "success" counts completions, errors included; when every
                // completion erred but the volume is still tiny, pass
                let real_success = success - exception;
                if real_success <= 0.0 && exception < self.rule.min_request_amount as f64 {
                    return true;
                }
                if exception / success < self.rule.threshold {
                    return true;
                }
            }
            DegradeGrade::ErrorCount => {
                // the minute window backs this count; a time window below
                // 60 s may re-trip right after the reset
                let exception = cluster_node.total_exception() as f64;
                if exception < self.rule.threshold {
                    return true;
                }
            }
        }
        self.trip();
        false
    }

    fn trip(&self) {
        if self
            .status
            .tripped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            let status = Arc::clone(&self.status);
            let rule = Arc::clone(&self.rule);
            let window_ms = self.rule.time_window_sec as u64 * 1000;
            std::thread::spawn(move || {
                utils::sleep_for_ms(window_ms);
                status.slow_count.store(0, Ordering::SeqCst);
                status.tripped.store(false, Ordering::SeqCst);
                logging::debug!("[Degrade] circuit breaker reset, rule {:?}", rule);
            });
        }
    }

    #[cfg(test)]
    pub(crate) fn force_trip(&self) {
        self.trip();
    }
}
