use super::*;
use crate::{base::GovernanceRule, logging, Error, Result};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

/// ControllerGenfn represents the traffic controller generator function of a
/// specific (calculate, control) strategy pair.
pub type ControllerGenfn = dyn Send + Sync + Fn(Arc<Rule>) -> Result<Arc<Controller>>;

#[derive(Hash, PartialEq, Eq)]
pub struct ControllerGenKey {
    calculate_strategy: CalculateStrategy,
    control_strategy: ControlStrategy,
}

impl ControllerGenKey {
    pub fn new(calculate_strategy: CalculateStrategy, control_strategy: ControlStrategy) -> Self {
        ControllerGenKey {
            calculate_strategy,
            control_strategy,
        }
    }
}

pub type ControllerMap = HashMap<String, Vec<Arc<Controller>>>;
pub type RuleMap = HashMap<String, HashSet<Arc<Rule>>>;

fn gen_with(
    rule: Arc<Rule>,
    calculator: Arc<dyn Calculator>,
    checker: Arc<dyn Checker>,
) -> Result<Arc<Controller>> {
    Ok(Arc::new(Controller::new(rule, calculator, checker)))
}

lazy_static! {
    static ref GEN_FUN_MAP: RwLock<HashMap<ControllerGenKey, Box<ControllerGenfn>>> = {
        let mut gen_fun_map: HashMap<ControllerGenKey, Box<ControllerGenfn>> = HashMap::new();
        gen_fun_map.insert(
            ControllerGenKey::new(CalculateStrategy::Direct, ControlStrategy::Reject),
            Box::new(|rule: Arc<Rule>| {
                let calculator = Arc::new(DirectCalculator::new(rule.threshold));
                let checker = Arc::new(RejectChecker::new(Arc::clone(&rule)));
                gen_with(rule, calculator, checker)
            }),
        );
        gen_fun_map.insert(
            ControllerGenKey::new(CalculateStrategy::Direct, ControlStrategy::Throttling),
            Box::new(|rule: Arc<Rule>| {
                let calculator = Arc::new(DirectCalculator::new(rule.threshold));
                let checker = Arc::new(ThrottlingChecker::new(Arc::clone(&rule)));
                gen_with(rule, calculator, checker)
            }),
        );
        gen_fun_map.insert(
            ControllerGenKey::new(CalculateStrategy::WarmUp, ControlStrategy::Reject),
            Box::new(|rule: Arc<Rule>| {
                let calculator = Arc::new(WarmUpCalculator::new(Arc::clone(&rule)));
                let checker = Arc::new(RejectChecker::new(Arc::clone(&rule)));
                gen_with(rule, calculator, checker)
            }),
        );
        gen_fun_map.insert(
            ControllerGenKey::new(CalculateStrategy::WarmUp, ControlStrategy::Throttling),
            Box::new(|rule: Arc<Rule>| {
                let calculator = Arc::new(WarmUpCalculator::new(Arc::clone(&rule)));
                let checker = Arc::new(ThrottlingChecker::new(Arc::clone(&rule)));
                gen_with(rule, calculator, checker)
            }),
        );
        RwLock::new(gen_fun_map)
    };
    static ref CONTROLLER_MAP: Mutex<ControllerMap> = Mutex::new(HashMap::new());
    static ref RULE_MAP: Mutex<RuleMap> = Mutex::new(HashMap::new());
}

fn log_rule_update(map: &RuleMap) {
    if map.is_empty() {
        logging::info!("[FlowRuleManager] Flow rules were cleared")
    } else {
        logging::info!("[FlowRuleManager] Flow rules were loaded: {:?}", map.values())
    }
}

/// `load_rules` replaces all flow rules with the given set. The returned
/// `bool` indicates whether a real load happened; loading an identical set is
/// a no-op.
// This func acquires the locks on the global `RULE_MAP` and `CONTROLLER_MAP`,
// release your own holds on them before calling it.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        rule_map.entry(rule.resource.clone()).or_default().insert(rule);
    }

    let mut global_rule_map = RULE_MAP.lock().unwrap();
    if *global_rule_map == rule_map {
        logging::info!("[Flow] Load rules is the same with current rules, so ignore load operation.");
        return false;
    }

    // ignore invalid rules
    let mut valid_rules_map: RuleMap = HashMap::with_capacity(rule_map.len());
    for (res, rules) in &rule_map {
        let mut valid_rules = HashSet::new();
        for rule in rules {
            match rule.is_valid() {
                Ok(_) => {
                    valid_rules.insert(Arc::clone(rule));
                }
                Err(err) => logging::warn!(
                    "[Flow load_rules] Ignoring invalid flow rule {:?}, reason: {:?}",
                    rule,
                    err
                ),
            }
        }
        if !valid_rules.is_empty() {
            valid_rules_map.insert(res.clone(), valid_rules);
        }
    }

    let mut controller_map = CONTROLLER_MAP.lock().unwrap();
    let mut valid_controller_map = HashMap::with_capacity(valid_rules_map.len());
    for (res, rules) in valid_rules_map.iter() {
        let mut placeholder = Vec::new();
        let new_tcs = build_resource_traffic_shaping_controller(
            res,
            rules,
            controller_map.get_mut(res).unwrap_or(&mut placeholder),
        );
        if !new_tcs.is_empty() {
            valid_controller_map.insert(res.clone(), new_tcs);
        }
    }
    *controller_map = valid_controller_map;
    *global_rule_map = rule_map;
    drop(controller_map);
    drop(global_rule_map);
    log_rule_update(&valid_rules_map);
    true
}

/// `load_rules_of_resource` replaces the given resource's flow rules only.
pub fn load_rules_of_resource(res: &String, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let rules: HashSet<_> = rules.into_iter().collect();
    let mut global_rule_map = RULE_MAP.lock().unwrap();
    let mut global_controller_map = CONTROLLER_MAP.lock().unwrap();
    if rules.is_empty() {
        global_rule_map.remove(res);
        global_controller_map.remove(res);
        logging::info!("[Flow] clear resource level rules, resource {}", res);
        return Ok(true);
    }
    if global_rule_map.get(res).unwrap_or(&HashSet::new()) == &rules {
        logging::info!(
            "[Flow] Load resource level rules is the same with current resource level rules, so ignore load operation."
        );
        return Ok(false);
    }

    let mut valid_res_rules = HashSet::with_capacity(rules.len());
    for rule in &rules {
        match rule.is_valid() {
            Ok(_) => {
                valid_res_rules.insert(Arc::clone(rule));
            }
            Err(err) => logging::warn!(
                "[Flow load_rules_of_resource] Ignoring invalid flow rule {:?}, reason: {:?}",
                rule,
                err
            ),
        }
    }
    let mut placeholder = Vec::new();
    let new_tcs = build_resource_traffic_shaping_controller(
        res,
        &valid_res_rules,
        global_controller_map.get_mut(res).unwrap_or(&mut placeholder),
    );
    if new_tcs.is_empty() {
        global_controller_map.remove(res);
    } else {
        global_controller_map.insert(res.clone(), new_tcs);
    }
    global_rule_map.insert(res.clone(), rules);
    Ok(true)
}

pub fn clear_rules() {
    RULE_MAP.lock().unwrap().clear();
    CONTROLLER_MAP.lock().unwrap().clear();
}

pub fn get_rules_of_resource(res: &String) -> Vec<Arc<Rule>> {
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

pub fn get_traffic_controller_list_for(res: &str) -> Vec<Arc<Controller>> {
    CONTROLLER_MAP
        .lock()
        .unwrap()
        .get(res)
        .cloned()
        .unwrap_or_default()
}

/// A rule with `limit_app == "other"` only matches origins that no other rule
/// of the same resource names explicitly.
pub fn is_other_origin(origin: &str, res: &str) -> bool {
    if origin.is_empty() {
        return false;
    }
    if let Some(rules) = RULE_MAP.lock().unwrap().get(res) {
        for rule in rules {
            if rule.limit_app == origin {
                return false;
            }
        }
    }
    true
}

/// Builds the controllers of one resource, reusing an existing controller
/// when its rule is unchanged so shaper state (queue tails, token buckets)
/// survives rule reloads.
fn build_resource_traffic_shaping_controller(
    res: &str,
    rules: &HashSet<Arc<Rule>>,
    old_controllers: &mut Vec<Arc<Controller>>,
) -> Vec<Arc<Controller>> {
    let mut new_tcs = Vec::with_capacity(rules.len());
    for rule in rules {
        if res != rule.resource {
            logging::error!(
                "unmatched resource name expect: {}, actual: {}",
                res,
                rule.resource
            );
            continue;
        }
        if let Some(pos) = old_controllers
            .iter()
            .position(|c| c.rule().as_ref() == rule.as_ref())
        {
            new_tcs.push(old_controllers.remove(pos));
            continue;
        }
        let key = ControllerGenKey::new(rule.calculate_strategy, rule.control_strategy);
        let gen_fun_map = GEN_FUN_MAP.read().unwrap();
        match gen_fun_map.get(&key) {
            Some(generator) => match generator(Arc::clone(rule)) {
                Ok(tc) => new_tcs.push(tc),
                Err(err) => logging::error!(
                    "[FlowRuleManager] Ignoring the rule due to controller generation error {:?}, rule {:?}",
                    err,
                    rule
                ),
            },
            None => logging::error!(
                "[FlowRuleManager] Unsupported strategy pair of flow rule {:?}",
                rule
            ),
        }
    }
    new_tcs
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn load_and_reuse() {
        let res = String::from("flow_manager_reuse");
        let r1 = Arc::new(Rule {
            resource: res.clone(),
            threshold: 10.0,
            ..Default::default()
        });
        let r2 = Arc::new(Rule {
            resource: res.clone(),
            threshold: 20.0,
            control_strategy: ControlStrategy::Throttling,
            max_queueing_time_ms: 100,
            ..Default::default()
        });
        assert!(load_rules_of_resource(&res, vec![Arc::clone(&r1), Arc::clone(&r2)]).unwrap());
        let tcs = get_traffic_controller_list_for(&res);
        assert_eq!(tcs.len(), 2);

        // reloading the identical set is a no-op
        assert!(!load_rules_of_resource(&res, vec![Arc::clone(&r1), Arc::clone(&r2)]).unwrap());

        // replacing one rule keeps the controller of the unchanged one
        let kept = tcs
            .iter()
            .find(|tc| tc.rule().as_ref() == r1.as_ref())
            .cloned()
            .unwrap();
        let r3 = Arc::new(Rule {
            resource: res.clone(),
            threshold: 30.0,
            ..Default::default()
        });
        assert!(load_rules_of_resource(&res, vec![Arc::clone(&r1), r3]).unwrap());
        let tcs = get_traffic_controller_list_for(&res);
        assert_eq!(tcs.len(), 2);
        assert!(tcs
            .iter()
            .any(|tc| Arc::ptr_eq(tc, &kept)));
        load_rules_of_resource(&res, vec![]).unwrap();
    }

    #[test]
    fn invalid_rules_ignored() {
        let res = String::from("flow_manager_invalid");
        let bad = Arc::new(Rule {
            resource: res.clone(),
            threshold: -1.0,
            ..Default::default()
        });
        load_rules_of_resource(&res, vec![bad]).unwrap();
        assert!(get_traffic_controller_list_for(&res).is_empty());
        load_rules_of_resource(&res, vec![]).unwrap();
    }

    #[test]
    fn other_origin() {
        let res = String::from("flow_manager_other");
        let named = Arc::new(Rule {
            resource: res.clone(),
            limit_app: "app-a".into(),
            threshold: 5.0,
            ..Default::default()
        });
        load_rules_of_resource(&res, vec![named]).unwrap();
        assert!(!is_other_origin("app-a", &res));
        assert!(is_other_origin("app-b", &res));
        assert!(!is_other_origin("", &res));
        load_rules_of_resource(&res, vec![]).unwrap();
    }
}
