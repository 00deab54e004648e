//! The embedded token server: rule registry, canonical counters, and the
//! default `TokenService` implementation working on them. A standalone
//! deployment wraps `DefaultTokenService` behind a transport; an embedded
//! one registers it directly via `cluster::set_token_service`.

pub mod checker;
pub mod config;
pub mod limiter;
pub mod rule_manager;

pub use self::config::*;
pub use limiter::{get_or_create_limiter, RequestLimiter};
pub use rule_manager::*;

use super::{ClusterTokenResult, TokenResultStatus, TokenService};
use crate::base::ParamKey;

/// Default implementation of the cluster `TokenService`. Both the server
/// loop of a standalone deployment and the embedded mode end up here.
#[derive(Debug, Default)]
pub struct DefaultTokenService {}

impl DefaultTokenService {
    pub fn new() -> Self {
        DefaultTokenService {}
    }

    fn is_valid_request(flow_id: u64, acquire_count: u32) -> bool {
        flow_id > 0 && acquire_count > 0
    }
}

impl TokenService for DefaultTokenService {
    fn request_token(
        &self,
        flow_id: u64,
        acquire_count: u32,
        prioritized: bool,
    ) -> ClusterTokenResult {
        if !Self::is_valid_request(flow_id, acquire_count) {
            return ClusterTokenResult::new(TokenResultStatus::BadRequest);
        }
        let rule = match rule_manager::get_flow_rule_by_id(flow_id) {
            Some(rule) => rule,
            None => return ClusterTokenResult::new(TokenResultStatus::NoRuleExists),
        };
        if !limiter::try_pass(&rule_manager::get_namespace(flow_id)) {
            return ClusterTokenResult::new(TokenResultStatus::TooManyRequest);
        }
        checker::acquire_cluster_token(&rule, acquire_count, prioritized)
    }

    fn request_param_token(
        &self,
        flow_id: u64,
        acquire_count: u32,
        params: Vec<ParamKey>,
    ) -> ClusterTokenResult {
        if !Self::is_valid_request(flow_id, acquire_count) || params.is_empty() {
            return ClusterTokenResult::new(TokenResultStatus::BadRequest);
        }
        if rule_manager::get_param_rule_by_id(flow_id).is_none() {
            return ClusterTokenResult::new(TokenResultStatus::NoRuleExists);
        }
        if !limiter::try_pass(&rule_manager::get_namespace(flow_id)) {
            return ClusterTokenResult::new(TokenResultStatus::TooManyRequest);
        }
        checker::acquire_cluster_param_token(flow_id, acquire_count, params)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::flow;
    use std::sync::Arc;

    #[test]
    fn bad_request_and_no_rule() {
        let service = DefaultTokenService::new();
        assert_eq!(
            service.request_token(0, 1, false).status,
            TokenResultStatus::BadRequest
        );
        assert_eq!(
            service.request_token(999_999_001, 1, false).status,
            TokenResultStatus::NoRuleExists
        );
        assert_eq!(
            service.request_param_token(999_999_001, 1, vec![]).status,
            TokenResultStatus::BadRequest
        );
    }

    #[test]
    fn avg_local_threshold_scales_with_clients() {
        let flow_id = 990_001u64;
        let rule = Arc::new(flow::Rule {
            resource: "cluster_server_avg_local".into(),
            threshold: 10.0,
            cluster_mode: true,
            cluster_config: flow::ClusterFlowConfig {
                flow_id,
                threshold_type: flow::ClusterThresholdType::AvgLocal,
                ..Default::default()
            },
            ..Default::default()
        });
        rule_manager::load_flow_rules("cluster_server_avg_local_ns", vec![rule]);
        rule_manager::set_connected_count("cluster_server_avg_local_ns", 3);

        let service = DefaultTokenService::new();
        // the cluster-wide budget is 10 * 3 = 30 per second
        let mut passed = 0;
        let mut blocked = 0;
        for _ in 0..40 {
            match service.request_token(flow_id, 1, false).status {
                TokenResultStatus::Ok => passed += 1,
                TokenResultStatus::Blocked => blocked += 1,
                status => panic!("unexpected status {:?}", status),
            }
        }
        assert_eq!(passed, 30);
        assert_eq!(blocked, 10);
    }

    #[test]
    fn param_token_accounting() {
        let flow_id = 990_002u64;
        let rule = Arc::new(crate::param_flow::Rule {
            resource: "cluster_server_param".into(),
            metric_type: crate::param_flow::MetricType::Qps,
            threshold: 2,
            duration_in_sec: 1,
            cluster_mode: true,
            cluster_config: crate::param_flow::ParamClusterConfig {
                flow_id,
                ..Default::default()
            },
            ..Default::default()
        });
        rule_manager::load_param_rules("cluster_server_param_ns", vec![rule]);

        let service = DefaultTokenService::new();
        assert_eq!(
            service
                .request_param_token(flow_id, 1, vec!["k".into()])
                .status,
            TokenResultStatus::Ok
        );
        assert_eq!(
            service
                .request_param_token(flow_id, 1, vec!["k".into()])
                .status,
            TokenResultStatus::Ok
        );
        assert_eq!(
            service
                .request_param_token(flow_id, 1, vec!["k".into()])
                .status,
            TokenResultStatus::Blocked
        );
        // a different value has its own budget
        assert_eq!(
            service
                .request_param_token(flow_id, 1, vec!["k2".into()])
                .status,
            TokenResultStatus::Ok
        );
    }
}
