use flowguard::{param_flow, EntryBuilder};
use std::sync::Arc;

#[test]
fn per_value_token_bucket() {
    let res = String::from("it_param_token_bucket");
    param_flow::load_rules_of_resource(
        &res,
        vec![Arc::new(param_flow::Rule {
            resource: res.clone(),
            metric_type: param_flow::MetricType::Qps,
            param_index: 0,
            threshold: 2,
            duration_in_sec: 1,
            ..Default::default()
        })],
    )
    .unwrap();

    let build = |arg: &str| {
        EntryBuilder::new(res.clone())
            .with_args(Some(vec![arg.into()]))
            .build()
    };

    // two tokens per value and second: the third call for "k" rejects
    build("k").unwrap().exit().unwrap();
    build("k").unwrap().exit().unwrap();
    assert!(build("k").is_err());
    // an unrelated value has its own bucket
    build("k2").unwrap().exit().unwrap();
    param_flow::load_rules_of_resource(&res, vec![]).unwrap();
}

#[test]
fn missing_argument_keeps_rule_inert() {
    let res = String::from("it_param_missing_arg");
    param_flow::load_rules_of_resource(
        &res,
        vec![Arc::new(param_flow::Rule {
            resource: res.clone(),
            metric_type: param_flow::MetricType::Qps,
            param_index: 3,
            threshold: 1,
            duration_in_sec: 1,
            ..Default::default()
        })],
    )
    .unwrap();

    // the rule watches an argument index this call does not provide
    for _ in 0..5 {
        let entry = EntryBuilder::new(res.clone())
            .with_args(Some(vec!["a".into()]))
            .build()
            .unwrap();
        entry.exit().unwrap();
    }
    param_flow::load_rules_of_resource(&res, vec![]).unwrap();
}

#[test]
fn concurrency_grade_releases_on_exit() {
    let res = String::from("it_param_concurrency");
    param_flow::load_rules_of_resource(
        &res,
        vec![Arc::new(param_flow::Rule {
            resource: res.clone(),
            metric_type: param_flow::MetricType::Concurrency,
            param_index: 0,
            threshold: 1,
            ..Default::default()
        })],
    )
    .unwrap();

    let build = |arg: &str| {
        EntryBuilder::new(res.clone())
            .with_args(Some(vec![arg.into()]))
            .build()
    };

    let holding = build("k").unwrap();
    // the single concurrency slot of "k" is taken
    assert!(build("k").is_err());
    holding.exit().unwrap();
    // released on exit
    let entry = build("k").unwrap();
    entry.exit().unwrap();
    param_flow::load_rules_of_resource(&res, vec![]).unwrap();
}

#[test]
fn specific_item_overrides_threshold() {
    let res = String::from("it_param_specific");
    let mut specific_items = std::collections::HashMap::new();
    specific_items.insert("vip".to_string(), 5u64);
    param_flow::load_rules_of_resource(
        &res,
        vec![Arc::new(param_flow::Rule {
            resource: res.clone(),
            metric_type: param_flow::MetricType::Qps,
            param_index: 0,
            threshold: 1,
            duration_in_sec: 1,
            specific_items,
            ..Default::default()
        })],
    )
    .unwrap();

    let build = |arg: &str| {
        EntryBuilder::new(res.clone())
            .with_args(Some(vec![arg.into()]))
            .build()
    };

    build("plain").unwrap().exit().unwrap();
    assert!(build("plain").is_err());
    for _ in 0..5 {
        build("vip").unwrap().exit().unwrap();
    }
    assert!(build("vip").is_err());
    param_flow::load_rules_of_resource(&res, vec![]).unwrap();
}
