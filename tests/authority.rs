use flowguard::{authority, enter_context, EntryBuilder};
use std::sync::Arc;

fn build_from(res: &str, origin: &str) -> flowguard::Result<flowguard::base::EntryStrongPtr> {
    let ctx = enter_context("it_authority_entrance", origin);
    EntryBuilder::new(res.into()).with_context(ctx).build()
}

#[test]
fn white_list_admits_listed_origins_only() {
    let res = String::from("it_authority_white");
    authority::load_rules_of_resource(
        &res,
        vec![Arc::new(authority::Rule {
            resource: res.clone(),
            strategy: authority::AuthorityStrategy::WhiteList,
            limit_app: "app-a,app-b".into(),
            ..Default::default()
        })],
    )
    .unwrap();

    build_from(&res, "app-a").unwrap().exit().unwrap();
    build_from(&res, "app-b").unwrap().exit().unwrap();
    assert!(build_from(&res, "app-c").is_err());
    // a substring of a listed origin does not match
    assert!(build_from(&res, "app-").is_err());
    // an empty origin is never restricted
    build_from(&res, "").unwrap().exit().unwrap();
    authority::load_rules_of_resource(&res, vec![]).unwrap();
}

#[test]
fn black_list_rejects_listed_origins_only() {
    let res = String::from("it_authority_black");
    authority::load_rules_of_resource(
        &res,
        vec![Arc::new(authority::Rule {
            resource: res.clone(),
            strategy: authority::AuthorityStrategy::BlackList,
            limit_app: "app-evil".into(),
            ..Default::default()
        })],
    )
    .unwrap();

    assert!(build_from(&res, "app-evil").is_err());
    build_from(&res, "app-good").unwrap().exit().unwrap();
    authority::load_rules_of_resource(&res, vec![]).unwrap();
}

#[test]
fn origin_scoped_flow_rule_reads_origin_statistics() {
    use flowguard::flow;
    let res = String::from("it_authority_origin_flow");
    flow::load_rules_of_resource(
        &res,
        vec![Arc::new(flow::Rule {
            resource: res.clone(),
            limit_app: "app-a".into(),
            threshold: 2.0,
            ..Default::default()
        })],
    )
    .unwrap();

    // the rule only binds calls originating from app-a
    let mut passed_a = 0;
    for _ in 0..4 {
        if let Ok(entry) = build_from(&res, "app-a") {
            passed_a += 1;
            entry.exit().unwrap();
        }
    }
    assert_eq!(passed_a, 2);
    // other origins are not limited by it
    for _ in 0..4 {
        build_from(&res, "app-b").unwrap().exit().unwrap();
    }
    flow::load_rules_of_resource(&res, vec![]).unwrap();
}
