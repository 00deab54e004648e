use super::ParamCounter;

/// `ParamsMetric` carries the real-time counters of the frequent ("hot")
/// parameter values of one resource. In each map the key is the parameter
/// value and the value is the counter.
#[derive(Debug, Default)]
pub struct ParamsMetric {
    /// last token-refill time, or the expected pass time of the queue tail
    /// under throttling
    pub(crate) rule_time_counter: ParamCounter,
    /// remaining tokens
    pub(crate) rule_token_counter: ParamCounter,
    /// real-time concurrency per value
    pub(crate) concurrency_counter: ParamCounter,
}
