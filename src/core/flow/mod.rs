//! Flow control: per-resource rules with multiple shaping strategies and an
//! optional cluster token path.

pub mod rule;
pub mod rule_manager;
pub mod slot;
pub mod traffic_shaping;

pub use rule::*;
pub use rule_manager::*;
pub use slot::*;
pub use traffic_shaping::*;
