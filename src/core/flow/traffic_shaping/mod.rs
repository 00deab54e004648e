//! Traffic shaping policies.
//!
//! A `Controller` pairs a `Calculator`, deciding the currently allowed
//! threshold, with a `Checker`, deciding what happens to a call given that
//! threshold. The four rule behaviors map onto the 2×2 matrix of
//! {Direct, WarmUp} × {Reject, Throttling}.

/// Direct calculator and reject checker
pub mod default;
/// Throttling checker (leaky-bucket virtual queue)
pub mod throttling;
/// Warm up calculator (cold-start token bucket)
pub mod warmup;

pub use self::default::*;
pub use throttling::*;
pub use warmup::*;

use super::Rule;
use crate::base::{Node, TokenResult};
use std::sync::Arc;

/// Traffic shaping `Calculator` calculates the actual traffic shaping
/// threshold based on the threshold of the rule and the shaping strategy.
pub trait Calculator: Send + Sync + std::fmt::Debug {
    fn calculate_allowed_threshold(&self, node: &Arc<dyn Node>, batch_count: u32) -> f64;
}

/// Traffic shaping `Checker` performs checking according to the current
/// metrics and the shaping strategy, then yields the token result.
pub trait Checker: Send + Sync + std::fmt::Debug {
    fn do_check(
        &self,
        node: Arc<dyn Node>,
        batch_count: u32,
        threshold: f64,
        prioritized: bool,
    ) -> TokenResult;
}

#[derive(Debug)]
pub struct Controller {
    rule: Arc<Rule>,
    calculator: Arc<dyn Calculator>,
    checker: Arc<dyn Checker>,
}

impl Controller {
    pub fn new(rule: Arc<Rule>, calculator: Arc<dyn Calculator>, checker: Arc<dyn Checker>) -> Self {
        Controller {
            rule,
            calculator,
            checker,
        }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn perform_checking(
        &self,
        node: Arc<dyn Node>,
        batch_count: u32,
        prioritized: bool,
    ) -> TokenResult {
        let allowed_threshold = self
            .calculator
            .calculate_allowed_threshold(&node, batch_count);
        self.checker
            .do_check(node, batch_count, allowed_threshold, prioritized)
    }
}
