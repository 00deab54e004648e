use super::config::namespace_max_allowed_qps;
use crate::base::Node;
use crate::stat::StatisticNode;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Per-namespace QPS guard of the token server itself; keeps one misbehaving
/// namespace from starving the server.
#[derive(Debug)]
pub struct RequestLimiter {
    stat: StatisticNode,
    max_allowed_qps: f64,
}

impl RequestLimiter {
    pub fn new(max_allowed_qps: f64) -> Self {
        RequestLimiter {
            stat: StatisticNode::new(),
            max_allowed_qps,
        }
    }

    pub fn try_pass(&self) -> bool {
        if self.stat.pass_qps() + 1.0 <= self.max_allowed_qps {
            self.stat.add_pass_request(1);
            true
        } else {
            self.stat.increase_block(1);
            false
        }
    }

    pub fn current_qps(&self) -> f64 {
        self.stat.pass_qps()
    }
}

lazy_static! {
    static ref LIMITER_MAP: RwLock<HashMap<String, Arc<RequestLimiter>>> =
        RwLock::new(HashMap::new());
}

pub fn get_or_create_limiter(namespace: &str) -> Arc<RequestLimiter> {
    if let Some(limiter) = LIMITER_MAP.read().unwrap().get(namespace) {
        return Arc::clone(limiter);
    }
    let mut map = LIMITER_MAP.write().unwrap();
    if let Some(limiter) = map.get(namespace) {
        return Arc::clone(limiter);
    }
    let limiter = Arc::new(RequestLimiter::new(namespace_max_allowed_qps()));
    map.insert(namespace.into(), Arc::clone(&limiter));
    limiter
}

/// Namespace-level admission of one incoming token request.
pub fn try_pass(namespace: &str) -> bool {
    get_or_create_limiter(namespace).try_pass()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn limits_qps() {
        let limiter = RequestLimiter::new(3.0);
        assert!(limiter.try_pass());
        assert!(limiter.try_pass());
        assert!(limiter.try_pass());
        assert!(!limiter.try_pass());
    }
}
