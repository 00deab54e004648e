use super::{MetricType, Rule};
use crate::{base::GovernanceRule, logging};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub type RuleMap = HashMap<MetricType, HashSet<Arc<Rule>>>;

lazy_static! {
    static ref RULE_MAP: Mutex<RuleMap> = Mutex::new(HashMap::new());
}

/// `load_rules` replaces all system rules with the given set. Returns whether
/// a real load happened.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        match rule.is_valid() {
            Ok(_) => {
                rule_map.entry(rule.metric_type).or_default().insert(rule);
            }
            Err(err) => logging::warn!(
                "[System load_rules] Ignoring invalid system rule {:?}, reason: {:?}",
                rule,
                err
            ),
        }
    }

    let mut global_rule_map = RULE_MAP.lock().unwrap();
    if *global_rule_map == rule_map {
        logging::info!(
            "[System] Load rules is the same with current rules, so ignore load operation."
        );
        return false;
    }
    *global_rule_map = rule_map;
    if global_rule_map.is_empty() {
        logging::info!("[SystemRuleManager] System rules were cleared");
    } else {
        logging::info!(
            "[SystemRuleManager] System rules were loaded: {:?}",
            global_rule_map.values()
        );
    }
    true
}

pub fn get_rules() -> Vec<Arc<Rule>> {
    let mut rules = Vec::new();
    for (_, type_rules) in RULE_MAP.lock().unwrap().iter() {
        rules.extend(type_rules.iter().cloned());
    }
    rules
}

pub fn clear_rules() {
    RULE_MAP.lock().unwrap().clear();
}
