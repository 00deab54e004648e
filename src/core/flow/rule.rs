use crate::base::{GovernanceRule, LIMIT_APP_DEFAULT};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub type FlowId = u64;

/// The shaping axis of a flow rule: throughput or concurrency.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum FlowGrade {
    Thread,
    Qps,
}

impl Default for FlowGrade {
    fn default() -> FlowGrade {
        FlowGrade::Qps
    }
}

/// RelationStrategy indicates the flow control strategy based on the relation
/// of invocations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum RelationStrategy {
    /// control the current resource directly
    Current,
    /// control by the statistics of the associated `ref_resource`
    Associated,
    /// control only when the call arrives through the entrance named by
    /// `ref_resource`
    Chain,
}

impl Default for RelationStrategy {
    fn default() -> RelationStrategy {
        RelationStrategy::Current
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum CalculateStrategy {
    Direct,
    WarmUp,
}

impl Default for CalculateStrategy {
    fn default() -> CalculateStrategy {
        CalculateStrategy::Direct
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum ControlStrategy {
    Reject,
    /// pending requests wait in a virtual queue until capacity frees up
    Throttling,
}

impl Default for ControlStrategy {
    fn default() -> ControlStrategy {
        ControlStrategy::Reject
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum ClusterThresholdType {
    /// `threshold` counts per connected client, scaled by the client count
    AvgLocal,
    /// `threshold` is the cluster-wide total
    Global,
}

impl Default for ClusterThresholdType {
    fn default() -> ClusterThresholdType {
        ClusterThresholdType::AvgLocal
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(default)]
pub struct ClusterFlowConfig {
    /// cluster-wide unique id of the rule; the only payload the token
    /// protocol carries to identify it
    pub flow_id: FlowId,
    pub threshold_type: ClusterThresholdType,
    /// degrade to the local check when the token server is unreachable or
    /// answers with a failure status
    pub fallback_to_local_when_fail: bool,
}

impl Default for ClusterFlowConfig {
    fn default() -> Self {
        ClusterFlowConfig {
            flow_id: 0,
            threshold_type: ClusterThresholdType::default(),
            fallback_to_local_when_fail: true,
        }
    }
}

/// Rule describes the strategy of flow control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// unique ID of the rule (optional)
    pub id: String,
    /// resource name
    pub resource: String,
    /// origin this rule applies to: a concrete origin name, `default`
    /// (everyone), or `other` (origins no other rule of the resource names)
    pub limit_app: String,
    pub grade: FlowGrade,
    /// `threshold` means QPS for the `Qps` grade and concurrent calls for the
    /// `Thread` grade
    pub threshold: f64,
    pub relation_strategy: RelationStrategy,
    pub ref_resource: String,
    pub calculate_strategy: CalculateStrategy,
    pub control_strategy: ControlStrategy,
    pub warm_up_period_sec: u32,
    pub warm_up_cold_factor: u32,
    /// `max_queueing_time_ms` only takes effect when `control_strategy` is
    /// `Throttling`; zero means requests beyond the pace reject directly
    pub max_queueing_time_ms: u32,
    pub cluster_mode: bool,
    pub cluster_config: ClusterFlowConfig,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            limit_app: LIMIT_APP_DEFAULT.into(),
            grade: FlowGrade::default(),
            threshold: 0.0,
            relation_strategy: RelationStrategy::default(),
            ref_resource: String::default(),
            calculate_strategy: CalculateStrategy::default(),
            control_strategy: ControlStrategy::default(),
            warm_up_period_sec: 0,
            warm_up_cold_factor: 0,
            max_queueing_time_ms: 0,
            cluster_mode: false,
            cluster_config: ClusterFlowConfig::default(),
        }
    }
}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.resource.hash(state);
        self.ref_resource.hash(state);
    }
}

impl GovernanceRule for Rule {
    fn resource_name(&self) -> String {
        self.resource.clone()
    }

    fn is_valid(&self) -> crate::Result<()> {
        if self.resource.is_empty() {
            return Err(Error::msg("empty resource name"));
        }
        if self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        if self.relation_strategy != RelationStrategy::Current && self.ref_resource.is_empty() {
            return Err(Error::msg(
                "ref_resource must be non empty when relation_strategy is Associated or Chain",
            ));
        }
        if self.calculate_strategy == CalculateStrategy::WarmUp {
            if self.warm_up_period_sec == 0 {
                return Err(Error::msg("warm_up_period_sec must be greater than 0"));
            }
            if self.warm_up_cold_factor == 1 {
                return Err(Error::msg("warm_up_cold_factor must be greater than 1"));
            }
        }
        if self.grade == FlowGrade::Thread
            && (self.calculate_strategy != CalculateStrategy::Direct
                || self.control_strategy != ControlStrategy::Reject)
        {
            return Err(Error::msg(
                "the Thread grade only supports Direct calculation and Reject control",
            ));
        }
        if self.cluster_mode && self.cluster_config.flow_id == 0 {
            return Err(Error::msg("invalid cluster flow id"));
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.limit_app == other.limit_app
            && self.grade == other.grade
            && self.threshold == other.threshold
            && self.relation_strategy == other.relation_strategy
            && self.ref_resource == other.ref_resource
            && self.calculate_strategy == other.calculate_strategy
            && self.control_strategy == other.control_strategy
            && self.warm_up_period_sec == other.warm_up_period_sec
            && self.warm_up_cold_factor == other.warm_up_cold_factor
            && self.max_queueing_time_ms == other.max_queueing_time_ms
            && self.cluster_mode == other.cluster_mode
            && self.cluster_config == other.cluster_config
    }
}

impl Eq for Rule {}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmtted = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", fmtted)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn is_valid_rule() {
        let bad_rule1 = Rule {
            threshold: 1.0,
            resource: "".into(),
            ..Default::default()
        };
        let bad_rule2 = Rule {
            threshold: -1.9,
            resource: "test".into(),
            ..Default::default()
        };
        let bad_rule3 = Rule {
            threshold: 5.0,
            resource: "test".into(),
            calculate_strategy: CalculateStrategy::WarmUp,
            ..Default::default()
        };
        let bad_rule4 = Rule {
            threshold: 5.0,
            resource: "test".into(),
            grade: FlowGrade::Thread,
            control_strategy: ControlStrategy::Throttling,
            max_queueing_time_ms: 10,
            ..Default::default()
        };
        let good_rule1 = Rule {
            threshold: 10.0,
            resource: "test".into(),
            calculate_strategy: CalculateStrategy::WarmUp,
            control_strategy: ControlStrategy::Throttling,
            warm_up_period_sec: 10,
            max_queueing_time_ms: 10,
            ..Default::default()
        };
        let good_rule2 = Rule {
            threshold: 4.0,
            resource: "test".into(),
            grade: FlowGrade::Thread,
            ..Default::default()
        };

        assert!(bad_rule1.is_valid().is_err());
        assert!(bad_rule2.is_valid().is_err());
        assert!(bad_rule3.is_valid().is_err());
        assert!(bad_rule4.is_valid().is_err());
        assert!(good_rule1.is_valid().is_ok());
        assert!(good_rule2.is_valid().is_ok());
    }

    #[test]
    fn cluster_rule_needs_flow_id() {
        let rule = Rule {
            resource: "test".into(),
            threshold: 10.0,
            cluster_mode: true,
            ..Default::default()
        };
        assert!(rule.is_valid().is_err());
    }
}
