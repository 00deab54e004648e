//! Process-level system metrics consumed by the system protection rules.
//! The runtime does not sample the operating system itself; an external
//! collector publishes the values through the setters. Unset metrics stay
//! negative and never trigger a rule.

use lazy_static::lazy_static;
use std::sync::atomic::{AtomicU64, Ordering};

lazy_static! {
    static ref SYSTEM_LOAD: AtomicU64 = AtomicU64::new((-1.0f64).to_bits());
    static ref CPU_USAGE: AtomicU64 = AtomicU64::new((-1.0f64).to_bits());
}

pub fn set_system_load(load: f64) {
    SYSTEM_LOAD.store(load.to_bits(), Ordering::SeqCst);
}

pub fn current_load() -> f64 {
    f64::from_bits(SYSTEM_LOAD.load(Ordering::SeqCst))
}

/// CPU usage ratio in `[0.0, 1.0]`.
pub fn set_cpu_usage(usage: f64) {
    CPU_USAGE.store(usage.to_bits(), Ordering::SeqCst);
}

pub fn current_cpu_usage() -> f64 {
    f64::from_bits(CPU_USAGE.load(Ordering::SeqCst))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn load_round_trip() {
        set_system_load(2.5);
        assert!((current_load() - 2.5).abs() < f64::EPSILON);
        set_system_load(-1.0);
    }
}
