use super::*;
use crate::{base::GovernanceRule, logging, Error, Result};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

/// ControllerGenfn represents the controller generator function of a
/// specific control behavior.
pub type ControllerGenfn =
    dyn Send + Sync + Fn(Arc<Rule>, Option<Arc<ParamsMetric>>) -> Arc<Controller>;

pub type ControllerMap = HashMap<String, Vec<Arc<Controller>>>;
pub type RuleMap = HashMap<String, HashSet<Arc<Rule>>>;

lazy_static! {
    static ref GEN_FUN_MAP: RwLock<HashMap<ControlStrategy, Box<ControllerGenfn>>> = {
        let mut gen_fun_map: HashMap<ControlStrategy, Box<ControllerGenfn>> = HashMap::new();
        gen_fun_map.insert(ControlStrategy::Reject, Box::new(gen_reject));
        gen_fun_map.insert(ControlStrategy::Throttling, Box::new(gen_throttling));
        RwLock::new(gen_fun_map)
    };
    static ref CONTROLLER_MAP: RwLock<ControllerMap> = RwLock::new(HashMap::new());
    static ref RULE_MAP: Mutex<RuleMap> = Mutex::new(HashMap::new());
}

pub(crate) fn gen_reject(rule: Arc<Rule>, metric: Option<Arc<ParamsMetric>>) -> Arc<Controller> {
    let metric = metric.unwrap_or_else(|| Arc::new(Controller::new_metric(&rule)));
    let checker = Arc::new(RejectChecker::new(Arc::clone(&rule), Arc::clone(&metric)));
    Arc::new(Controller::new(rule, metric, checker))
}

/// Builds a standalone token-bucket controller for the embedded cluster
/// token server; server-side parameter accounting always uses the reject
/// checker, queueing happens on the client.
pub(crate) fn gen_controller_for_cluster(rule: &Arc<Rule>) -> Arc<Controller> {
    gen_reject(Arc::clone(rule), None)
}

pub(crate) fn gen_throttling(
    rule: Arc<Rule>,
    metric: Option<Arc<ParamsMetric>>,
) -> Arc<Controller> {
    let metric = metric.unwrap_or_else(|| Arc::new(Controller::new_metric(&rule)));
    let checker = Arc::new(ThrottlingChecker::new(Arc::clone(&rule), Arc::clone(&metric)));
    Arc::new(Controller::new(rule, metric, checker))
}

pub fn get_traffic_controller_list_for(res: &str) -> Vec<Arc<Controller>> {
    CONTROLLER_MAP
        .read()
        .unwrap()
        .get(res)
        .cloned()
        .unwrap_or_default()
}

fn log_rule_update(map: &RuleMap) {
    if map.is_empty() {
        logging::info!("[ParamFlowRuleManager] Parameter flow rules were cleared")
    } else {
        logging::info!(
            "[ParamFlowRuleManager] Parameter flow rules were loaded: {:?}",
            map.values()
        )
    }
}

/// `load_rules` replaces all parameter flow rules with the given set.
/// Returns whether a real load happened. A controller whose rule is
/// unchanged is reused; one whose statistic shape is reusable keeps its
/// counters.
pub fn load_rules(rules: Vec<Arc<Rule>>) -> bool {
    let mut rule_map: RuleMap = HashMap::new();
    for rule in rules {
        rule_map.entry(rule.resource.clone()).or_default().insert(rule);
    }

    let mut global_rule_map = RULE_MAP.lock().unwrap();
    if *global_rule_map == rule_map {
        logging::info!(
            "[ParamFlow] Load rules is the same with current rules, so ignore load operation."
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
                    "[ParamFlow load_rules] Ignoring invalid parameter flow rule {:?}, reason: {:?}",
                    rule,
                    err
                ),
            }
        }
        if !valid_rules.is_empty() {
            valid_rules_map.insert(res.clone(), valid_rules);
        }
    }

    let mut controller_map = CONTROLLER_MAP.write().unwrap();
    let mut valid_controller_map = HashMap::with_capacity(valid_rules_map.len());
    for (res, rules) in valid_rules_map.iter() {
        let mut placeholder = Vec::new();
        let new_tcs = build_resource_controllers(
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

/// `load_rules_of_resource` replaces the given resource's parameter flow
/// rules only.
pub fn load_rules_of_resource(res: &String, rules: Vec<Arc<Rule>>) -> Result<bool> {
    if res.is_empty() {
        return Err(Error::msg("empty resource"));
    }
    let rules: HashSet<_> = rules.into_iter().collect();
    let mut global_rule_map = RULE_MAP.lock().unwrap();
    let mut controller_map = CONTROLLER_MAP.write().unwrap();
    if rules.is_empty() {
        global_rule_map.remove(res);
        controller_map.remove(res);
        logging::info!("[ParamFlow] clear resource level rules, resource {}", res);
        return Ok(true);
    }
    if global_rule_map.get(res).unwrap_or(&HashSet::new()) == &rules {
        return Ok(false);
    }
    let mut valid_rules = HashSet::with_capacity(rules.len());
    for rule in &rules {
        match rule.is_valid() {
            Ok(_) => {
                valid_rules.insert(Arc::clone(rule));
            }
            Err(err) => logging::warn!(
                "[ParamFlow load_rules_of_resource] Ignoring invalid parameter flow rule {:?}, reason: {:?}",
                rule,
                err
            ),
        }
    }
    let mut placeholder = Vec::new();
    let new_tcs = build_resource_controllers(
        res,
        &valid_rules,
        controller_map.get_mut(res).unwrap_or(&mut placeholder),
    );
    if new_tcs.is_empty() {
        controller_map.remove(res);
    } else {
        controller_map.insert(res.clone(), new_tcs);
    }
    global_rule_map.insert(res.clone(), rules);
    Ok(true)
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
    CONTROLLER_MAP.write().unwrap().clear();
}

fn build_resource_controllers(
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
        // a rule with the same statistic shape keeps the existing counters
        let reused_metric = old_controllers
            .iter()
            .find(|c| c.rule().is_stat_reusable(rule))
            .map(|c| Arc::clone(c.metric()));
        let gen_fun_map = GEN_FUN_MAP.read().unwrap();
        match gen_fun_map.get(&rule.control_strategy) {
            Some(generator) => new_tcs.push(generator(Arc::clone(rule), reused_metric)),
            None => logging::error!(
                "[ParamFlowRuleManager] Unsupported control strategy of parameter flow rule {:?}",
                rule
            ),
        }
    }
    new_tcs
}
