use super::*;
use crate::base::{BaseSlot, Entry, StatSlot};
use crate::logging;
use lazy_static::lazy_static;
use std::sync::{atomic::Ordering, Arc};

const STAT_SLOT_ORDER: u32 = 2000;

/// ConcurrencyStatSlot maintains the per-value concurrency counters of
/// concurrency-graded parameter flow rules.
pub struct ConcurrencyStatSlot {}

lazy_static! {
    pub static ref DEFAULT_CONCURRENCY_STAT_SLOT: Arc<ConcurrencyStatSlot> =
        Arc::new(ConcurrencyStatSlot {});
}

pub fn default_concurrency_stat_slot() -> Arc<ConcurrencyStatSlot> {
    DEFAULT_CONCURRENCY_STAT_SLOT.clone()
}

impl BaseSlot for ConcurrencyStatSlot {
    fn order(&self) -> u32 {
        STAT_SLOT_ORDER
    }
}

impl StatSlot for ConcurrencyStatSlot {
    fn on_entry_pass(&self, entry: &Entry) {
        let res = entry.resource().name();
        for tc in get_traffic_controller_list_for(res) {
            if tc.rule().metric_type != MetricType::Concurrency {
                continue;
            }
            if let Some(arg) = tc.extract_args(entry) {
                match tc.metric().concurrency_counter.get(&arg) {
                    Some(counter) => {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                    None => {
                        logging::debug!(
                            "[ConcurrencyStatSlot on_entry_pass] Parameter does not exist in the concurrency counter, argument: {:?}",
                            arg
                        );
                    }
                }
            }
        }
    }

    fn on_completed(&self, entry: &mut Entry) {
        let res = entry.resource().name();
        for tc in get_traffic_controller_list_for(res) {
            if tc.rule().metric_type != MetricType::Concurrency {
                continue;
            }
            if let Some(arg) = tc.extract_args(entry) {
                match tc.metric().concurrency_counter.get(&arg) {
                    Some(counter) => {
                        counter
                            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                                Some(v.saturating_sub(1))
                            })
                            .ok();
                    }
                    None => {
                        logging::debug!(
                            "[ConcurrencyStatSlot on_completed] Parameter does not exist in the concurrency counter, argument: {:?}",
                            arg
                        );
                    }
                }
            }
        }
    }
}
