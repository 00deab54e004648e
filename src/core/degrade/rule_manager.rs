use super::{Breaker, Rule};
use crate::{base::GovernanceRule, logging, Error, Result};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub type BreakerMap = HashMap<String, Vec<Arc<Breaker>>>;
pub type RuleMap = HashMap<String, HashSet<Arc<Rule>>>;

lazy_static! {
    static ref BREAKER_MAP: Mutex<BreakerMap> = Mutex::new(HashMap::new());
    static ref RULE_MAP: Mutex<RuleMap> = Mutex::new(HashMap::new());
}

fn log_rule_update(map: &RuleMap) {
    if map.is_empty() {
        logging::info!("[DegradeRuleManager] Degrade rules were cleared")
    } else {
        logging::info!(
            "[DegradeRuleManager] Degrade rules were loaded: {:?}",
            map.values()
        )
    }
}

/// `load_rules` replaces all degrade rules with the given set. Returns
/// whether a real load happened. Breakers of unchanged rules keep their
/// state; in particular a tripped breaker stays tripped across a reload.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        rule_map.entry(rule.resource.clone()).or_default().insert(rule);
    }

    let mut global_rule_map = RULE_MAP.lock().unwrap();
    if *global_rule_map == rule_map {
        logging::info!(
            "[Degrade] Load rules is the same with current rules, so ignore load operation."
        );
        return false;
    }

    let mut valid_rules_map: RuleMap = HashMap::with_capacity(rule_map.len());
    for (res, rules) in &rule_map {
        let mut valid_rules = HashSet::new();
        for rule in rules {
            match rule.is_valid() {
                Ok(_) => {
                    valid_rules.insert(Arc::clone(rule));
                }
                Err(err) => logging::warn!(
                    "[Degrade load_rules] Ignoring invalid degrade rule {:?}, reason: {:?}",
                    rule,
                    err
                ),
            }
        }
        if !valid_rules.is_empty() {
            valid_rules_map.insert(res.clone(), valid_rules);
        }
    }

    let mut breaker_map = BREAKER_MAP.lock().unwrap();
    let mut new_breaker_map: BreakerMap = HashMap::with_capacity(valid_rules_map.len());
    for (res, rules) in valid_rules_map.iter() {
        let mut old = breaker_map.remove(res).unwrap_or_default();
        let mut breakers = Vec::with_capacity(rules.len());
        for rule in rules {
            if let Some(pos) = old.iter().position(|b| b.rule().as_ref() == rule.as_ref()) {
                breakers.push(old.remove(pos));
            } else {
                breakers.push(Arc::new(Breaker::new(Arc::clone(rule))));
            }
        }
        new_breaker_map.insert(res.clone(), breakers);
    }
    *breaker_map = new_breaker_map;
    *global_rule_map = rule_map;
    drop(breaker_map);
    drop(global_rule_map);
    log_rule_update(&valid_rules_map);
    true
}

/// `load_rules_of_resource` replaces the given resource's degrade rules only.
pub fn load_rules_of_resource(res: &String, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let rules: HashSet<_> = rules.into_iter().collect();
    let mut global_rule_map = RULE_MAP.lock().unwrap();
    let mut breaker_map = BREAKER_MAP.lock().unwrap();
    if rules.is_empty() {
        global_rule_map.remove(res);
        breaker_map.remove(res);
        logging::info!("[Degrade] clear resource level rules, resource {}", res);
        return Ok(true);
    }
    if global_rule_map.get(res).unwrap_or(&HashSet::new()) == &rules {
        return Ok(false);
    }
    let mut old = breaker_map.remove(res).unwrap_or_default();
    let mut breakers = Vec::with_capacity(rules.len());
    for rule in &rules {
        if let Err(err) = rule.is_valid() {
            logging::warn!(
                "[Degrade load_rules_of_resource] Ignoring invalid degrade rule {:?}, reason: {:?}",
                rule,
                err
            );
            continue;
        }
        if let Some(pos) = old.iter().position(|b| b.rule().as_ref() == rule.as_ref()) {
            breakers.push(old.remove(pos));
        } else {
            breakers.push(Arc::new(Breaker::new(Arc::clone(rule))));
        }
    }
    if breakers.is_empty() {
        breaker_map.remove(res);
    } else {
        breaker_map.insert(res.clone(), breakers);
    }
    global_rule_map.insert(res.clone(), rules);
    Ok(true)
}

pub fn get_breakers_of_resource(res: &str) -> Vec<Arc<Breaker>> {
    BREAKER_MAP
        .lock()
        .unwrap()
        .get(res)
        .cloned()
        .unwrap_or_default()
}

pub fn get_rules() -> Vec<Arc<Rule>> {
    let mut rules = Vec::new();
    for (_, res_rules) in RULE_MAP.lock().unwrap().iter() {
        rules.extend(res_rules.iter().cloned());
    }
    rules
}

pub fn clear_rules() {
    RULE_MAP.lock().unwrap().clear();
    BREAKER_MAP.lock().unwrap().clear();
}

#[cfg(test)]
mod test {
    use super::super::DegradeGrade;
    use super::*;

    #[test]
    fn breaker_state_survives_reload() {
        let res = String::from("degrade_manager_reload");
        let rule = Arc::new(Rule {
            resource: res.clone(),
            grade: DegradeGrade::ErrorCount,
            threshold: 5.0,
            time_window_sec: 60,
            ..Default::default()
        });
        load_rules_of_resource(&res, vec![Arc::clone(&rule)]).unwrap();
        let breakers = get_breakers_of_resource(&res);
        assert_eq!(breakers.len(), 1);
        breakers[0].force_trip();

        // reload with the identical rule plus a second one
        let other = Arc::new(Rule {
            resource: res.clone(),
            grade: DegradeGrade::Rt,
            threshold: 50.0,
            time_window_sec: 60,
            ..Default::default()
        });
        load_rules_of_resource(&res, vec![Arc::clone(&rule), other]).unwrap();
        let breakers = get_breakers_of_resource(&res);
        assert_eq!(breakers.len(), 2);
        assert!(breakers
            .iter()
            .find(|b| b.rule().as_ref() == rule.as_ref())
            .unwrap()
            .is_tripped());
        load_rules_of_resource(&res, vec![]).unwrap();
    }

    #[test]
    fn invalid_rules_ignored() {
        let res = String::from("degrade_manager_invalid");
        let bad = Arc::new(Rule {
            resource: res.clone(),
            threshold: 10.0,
            time_window_sec: 0,
            ..Default::default()
        });
        load_rules_of_resource(&res, vec![bad]).unwrap();
        assert!(get_breakers_of_resource(&res).is_empty());
        load_rules_of_resource(&res, vec![]).unwrap();
    }
}
