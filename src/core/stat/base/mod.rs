//! Bucketed, time-aligned statistic substrate.

pub mod bucket_leap_array;
pub mod leap_array;
pub mod metric_bucket;
pub mod occupy_leap_array;
pub mod sliding_window_metric;

pub use bucket_leap_array::*;
pub use leap_array::*;
pub use metric_bucket::*;
pub use occupy_leap_array::*;
pub use sliding_window_metric::*;
