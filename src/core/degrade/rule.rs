use crate::base::GovernanceRule;
use crate::config::{DEGRADE_DEFAULT_MIN_REQUEST_AMOUNT, DEGRADE_DEFAULT_SLOW_REQUEST_AMOUNT};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The metric a circuit breaker watches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum DegradeGrade {
    /// average response time of the resource (threshold in ms)
    Rt,
    /// ratio of erroring calls to completed calls per second
    ErrorRatio,
    /// error count over the minute window
    ErrorCount,
}

impl Default for DegradeGrade {
    fn default() -> DegradeGrade {
        DegradeGrade::Rt
    }
}

/// Rule describes a circuit breaking policy: while the watched metric stays
/// beyond `threshold`, calls are cut off for `time_window_sec` seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// unique ID of the rule (optional)
    pub id: String,
    /// resource name
    pub resource: String,
    pub grade: DegradeGrade,
    /// RT threshold (ms), error ratio, or error count, per `grade`
    pub threshold: f64,
    /// recovery window after a trip; the breaker closes again once it elapsed
    pub time_window_sec: u32,
    /// consecutive slow requests tolerated before an `Rt` breaker trips
    pub rt_slow_request_amount: u32,
    /// minimum request volume per second before an `ErrorRatio` breaker may
    /// trip; avoids 100% ratios computed from a single call
    pub min_request_amount: u64,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            id: uuid::Uuid::new_v4().to_string(),
            resource: String::default(),
            grade: DegradeGrade::default(),
            threshold: 0.0,
            time_window_sec: 0,
            rt_slow_request_amount: DEGRADE_DEFAULT_SLOW_REQUEST_AMOUNT,
            min_request_amount: DEGRADE_DEFAULT_MIN_REQUEST_AMOUNT,
        }
    }
}

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
        if self.threshold < 0.0 {
            return Err(Error::msg("negative threshold"));
        }
        if self.time_window_sec == 0 {
            return Err(Error::msg("time_window_sec must be greater than 0"));
        }
        if self.grade == DegradeGrade::ErrorRatio && self.threshold > 1.0 {
            return Err(Error::msg(
                "invalid error ratio threshold (valid range: [0.0, 1.0])",
            ));
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
            && self.grade == other.grade
            && self.threshold == other.threshold
            && self.time_window_sec == other.time_window_sec
            && self.rt_slow_request_amount == other.rt_slow_request_amount
            && self.min_request_amount == other.min_request_amount
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
    #[should_panic(expected = "empty resource name")]
    fn invalid_name() {
        let rule = Rule {
            time_window_sec: 1,
            ..Default::default()
        };
        rule.is_valid().unwrap();
    }

    #[test]
    #[should_panic(expected = "time_window_sec must be greater than 0")]
    fn invalid_time_window() {
        let rule = Rule {
            resource: "abc".into(),
            threshold: 100.0,
            ..Default::default()
        };
        rule.is_valid().unwrap();
    }

    #[test]
    #[should_panic(expected = "invalid error ratio threshold")]
    fn invalid_ratio() {
        let rule = Rule {
            resource: "abc".into(),
            grade: DegradeGrade::ErrorRatio,
            threshold: 1.5,
            time_window_sec: 5,
            ..Default::default()
        };
        rule.is_valid().unwrap();
    }
}
