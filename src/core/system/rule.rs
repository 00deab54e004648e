use crate::base::GovernanceRule;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum MetricType {
    /// system load1 in Linux/Unix
    Load,
    /// average response time of all inbound requests
    AvgRt,
    /// concurrency of all inbound requests
    Concurrency,
    /// QPS of all inbound requests
    InboundQps,
    /// CPU usage ratio of the process host
    CpuUsage,
}

impl Default for MetricType {
    fn default() -> MetricType {
        MetricType::Load
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum AdaptiveStrategy {
    NoAdaptive,
    /// adaptive strategy based on ideas of TCP BBR: while the trigger metric
    /// is exceeded, concurrency may not outgrow the estimated pipeline
    /// capacity `max_success_qps × min_rt`
    Bbr,
}

impl Default for AdaptiveStrategy {
    fn default() -> AdaptiveStrategy {
        AdaptiveStrategy::NoAdaptive
    }
}

/// `Rule` describes a policy for system resiliency, guarding all inbound
/// traffic of the process.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// unique ID of the rule (optional)
    pub id: Option<String>,
    /// the trigger metric
    pub metric_type: MetricType,
    /// the adaptive strategy is not activated until the trigger metric
    /// reaches this count
    pub trigger_count: f64,
    pub strategy: AdaptiveStrategy,
}

impl GovernanceRule for Rule {
    fn resource_name(&self) -> String {
        format!("{:?}", self.metric_type)
    }

    fn is_valid(&self) -> Result<()> {
        if self.trigger_count < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        if self.metric_type == MetricType::CpuUsage && self.trigger_count > 1.0 {
            return Err(Error::msg("invalid CPU usage, valid range is [0.0, 1.0]"));
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.metric_type == other.metric_type
            && self.trigger_count == other.trigger_count
            && self.strategy == other.strategy
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.metric_type.hash(state);
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
    #[should_panic(expected = "negative threshold")]
    fn invalid_threshold() {
        let rule = Rule {
            metric_type: MetricType::InboundQps,
            trigger_count: -1.0,
            ..Default::default()
        };
        rule.is_valid().unwrap();
    }

    #[test]
    #[should_panic(expected = "invalid CPU usage, valid range is [0.0, 1.0]")]
    fn invalid_cpu_usage() {
        let rule = Rule {
            metric_type: MetricType::CpuUsage,
            trigger_count: 75.0,
            ..Default::default()
        };
        rule.is_valid().unwrap();
    }
}
