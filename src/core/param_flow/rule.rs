use crate::base::{GovernanceRule, ParamKey};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// MetricType represents the target metric type of a parameter flow rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum MetricType {
    /// check each hot value's concurrency and reject beyond the threshold
    Concurrency,
    /// check each hot value's request count per statistic duration; the
    /// `control_strategy` decides the shaping behavior
    Qps,
}

impl Default for MetricType {
    fn default() -> Self {
        MetricType::Concurrency
    }
}

/// ControlStrategy indicates the traffic shaping behavior; it only takes
/// effect for the `Qps` metric type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum ControlStrategy {
    Reject,
    Throttling,
}

impl Default for ControlStrategy {
    fn default() -> Self {
        ControlStrategy::Reject
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(default)]
pub struct ParamClusterConfig {
    /// cluster-wide unique id of the rule
    pub flow_id: u64,
    pub fallback_to_local_when_fail: bool,
}

impl Default for ParamClusterConfig {
    fn default() -> Self {
        ParamClusterConfig {
            flow_id: 0,
            fallback_to_local_when_fail: true,
        }
    }
}

/// Rule represents the hot-parameter flow control rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// unique ID of the rule (optional)
    pub id: String,
    /// resource name
    pub resource: String,
    pub metric_type: MetricType,
    pub control_strategy: ControlStrategy,
    /// `param_index` is the index into the call argument list; a negative
    /// index counts from the end
    pub param_index: isize,
    /// `param_key` addresses a named attachment instead of a positional
    /// argument; it takes priority over `param_index`
    pub param_key: String,
    /// threshold per parameter value
    pub threshold: u64,
    /// only takes effect when `control_strategy` is `Throttling`
    pub max_queueing_time_ms: u64,
    /// extra tokens tolerated on top of the threshold; `Reject` only
    pub burst_count: u64,
    /// statistic duration of the per-value token bucket; `Qps` only
    pub duration_in_sec: u64,
    /// max capacity of the per-value counter caches
    pub params_max_capacity: usize,
    /// per-value threshold overrides
    pub specific_items: HashMap<ParamKey, u64>,
    pub cluster_mode: bool,
    pub cluster_config: ParamClusterConfig,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            metric_type: MetricType::default(),
            control_strategy: ControlStrategy::default(),
            param_index: 0,
            param_key: String::default(),
            threshold: 0,
            max_queueing_time_ms: 0,
            burst_count: 0,
            duration_in_sec: 0,
            params_max_capacity: 0,
            specific_items: HashMap::default(),
            cluster_mode: false,
            cluster_config: ParamClusterConfig::default(),
        }
    }
}

impl Rule {
    pub fn is_stat_reusable(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.control_strategy == other.control_strategy
            && self.params_max_capacity == other.params_max_capacity
            && self.duration_in_sec == other.duration_in_sec
            && self.metric_type == other.metric_type
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.resource.hash(state);
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
        if self.metric_type == MetricType::Qps && self.duration_in_sec == 0 {
            return Err(Error::msg("invalid duration"));
        }
        if self.param_index > 0 && !self.param_key.is_empty() {
            return Err(Error::msg(
                "param index and param key are mutually exclusive",
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
            && self.metric_type == other.metric_type
            && self.control_strategy == other.control_strategy
            && self.params_max_capacity == other.params_max_capacity
            && self.param_index == other.param_index
            && self.param_key == other.param_key
            && self.threshold == other.threshold
            && self.duration_in_sec == other.duration_in_sec
            && self.specific_items == other.specific_items
            && self.cluster_mode == other.cluster_mode
            && self.cluster_config == other.cluster_config
            && ((self.control_strategy == ControlStrategy::Reject
                && self.burst_count == other.burst_count)
                || (self.control_strategy == ControlStrategy::Throttling
                    && self.max_queueing_time_ms == other.max_queueing_time_ms))
    }
}

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
    #[should_panic(expected = "empty resource name")]
    fn invalid_name() {
        let rule = Rule::default();
        rule.is_valid().unwrap();
    }

    #[test]
    #[should_panic(expected = "invalid duration")]
    fn invalid_duration() {
        let rule = Rule {
            resource: "name".into(),
            metric_type: MetricType::Qps,
            ..Default::default()
        };
        rule.is_valid().unwrap();
    }

    #[test]
    #[should_panic(expected = "param index and param key are mutually exclusive")]
    fn invalid_param() {
        let rule = Rule {
            resource: "abc".into(),
            metric_type: MetricType::Qps,
            duration_in_sec: 1,
            param_index: 10,
            param_key: "test2".into(),
            ..Default::default()
        };
        rule.is_valid().unwrap();
    }

    #[test]
    fn test_eq() {
        let mut specific_items: HashMap<ParamKey, u64> = HashMap::new();
        specific_items.insert("sss".into(), 1);
        specific_items.insert("1123".into(), 3);
        let rule1 = Rule {
            id: "abc".into(),
            resource: "abc".into(),
            metric_type: MetricType::Concurrency,
            control_strategy: ControlStrategy::Reject,
            param_index: 0,
            param_key: "key".into(),
            threshold: 110,
            max_queueing_time_ms: 5,
            burst_count: 10,
            duration_in_sec: 1,
            params_max_capacity: 10000,
            specific_items: specific_items.clone(),
            ..Default::default()
        };
        let rule2 = Rule {
            id: "abc".into(),
            ..rule1.clone()
        };
        assert_eq!(rule1, rule2);
    }
}
