use super::Rule;
use crate::{base::GovernanceRule, logging, Error, Result};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub type RuleMap = HashMap<String, HashSet<Arc<Rule>>>;

lazy_static! {
    static ref RULE_MAP: Mutex<RuleMap> = Mutex::new(HashMap::new());
}

/// `load_rules` replaces all authority rules with the given set. Returns
/// whether a real load happened.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        match rule.is_valid() {
            Ok(_) => {
                rule_map.entry(rule.resource.clone()).or_default().insert(rule);
            }
            Err(err) => logging::warn!(
                "[Authority load_rules] Ignoring invalid authority rule {:?}, reason: {:?}",
                rule,
                err
            ),
        }
    }

    let mut global_rule_map = RULE_MAP.lock().unwrap();
    if *global_rule_map == rule_map {
        logging::info!(
            "[Authority] Load rules is the same with current rules, so ignore load operation."
        );
        return false;
    }
    *global_rule_map = rule_map;
    if global_rule_map.is_empty() {
        logging::info!("[AuthorityRuleManager] Authority rules were cleared");
    } else {
        logging::info!(
            "[AuthorityRuleManager] Authority rules were loaded: {:?}",
            global_rule_map.values()
        );
    }
    true
}

/// `load_rules_of_resource` replaces the given resource's authority rules only.
pub fn load_rules_of_resource(res: &String, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let rules: HashSet<_> = rules
        .into_iter()
        .filter(|rule| match rule.is_valid() {
            Ok(_) => true,
            Err(err) => {
                logging::warn!(
                    "[Authority load_rules_of_resource] Ignoring invalid authority rule {:?}, reason: {:?}",
                    rule,
                    err
                );
                false
            }
        })
        .collect();
    let mut global_rule_map = RULE_MAP.lock().unwrap();
    if rules.is_empty() {
        global_rule_map.remove(res);
        logging::info!("[Authority] clear resource level rules, resource {}", res);
        return Ok(true);
    }
    if global_rule_map.get(res).unwrap_or(&HashSet::new()) == &rules {
        return Ok(false);
    }
    global_rule_map.insert(res.clone(), rules);
    Ok(true)
}

pub fn get_rules_of_resource(res: &str) -> Vec<Arc<Rule>> {
    RULE_MAP
        .lock()
        .unwrap()
        .get(res)
        .map(|rules| rules.iter().cloned().collect())
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
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn load_and_get() {
        let res = String::from("authority_manager_load");
        let rule = Arc::new(Rule {
            resource: res.clone(),
            limit_app: "app-a".into(),
            ..Default::default()
        });
        load_rules_of_resource(&res, vec![rule]).unwrap();
        assert_eq!(get_rules_of_resource(&res).len(), 1);
        load_rules_of_resource(&res, vec![]).unwrap();
        assert!(get_rules_of_resource(&res).is_empty());
    }
}
