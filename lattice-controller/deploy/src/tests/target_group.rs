use super::*;
use crate::manager::TargetGroupManager;
use lattice_controller_core::{
    api::{HealthCheckConfig, ResourceStatus, RuleAction, TargetStatus, WeightedTargetGroup},
    lookup::{BackendRef, RouteBackends},
    tags::{self, TargetGroupSource},
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn mk_backend(name: &str) -> BackendRef {
    BackendRef {
        name: name.to_string(),
        namespace: None,
        kind: None,
        port: Some(8080),
    }
}

fn mk_route(backends: &[&str]) -> RouteBackends {
    RouteBackends {
        deleting: false,
        backends: backends.iter().map(|b| mk_backend(b)).collect(),
    }
}

impl TestConfig {
    /// Seeds an owned target group carrying route provenance.
    fn seed_route_target_group(&self, service: &str, route: &str) {
        self.api.seed_target_group(
            &format!("k8s-{service}-{NS}-http-http1"),
            mk_tg_config(),
            ResourceStatus::Active,
            self.cloud
                .merge_default_tags(mk_provenance(service, route).to_tags()),
        );
    }

    fn target_group_names(&self) -> Vec<String> {
        let mut names = self
            .api
            .target_groups()
            .into_iter()
            .map(|tg| tg.summary.name)
            .collect::<Vec<_>>();
        names.sort();
        names
    }
}

#[tokio::test]
async fn creates_tagged_target_group_once() {
    let test = TestConfig::default();
    let mut stack = mk_stack(vec![mk_target_group("tg", "checkout-svc", "checkout").into()]);

    test.deployer().deploy(&mut stack).await.expect("deploy");
    test.deployer().deploy(&mut stack).await.expect("deploy");

    assert_eq!(test.api.calls("create_target_group"), 1);
    let status = stack.get::<TargetGroup>("tg").unwrap().status.clone().unwrap();
    let spec = &stack.get::<TargetGroup>("tg").unwrap().spec;
    assert_eq!(status.name, spec.name(false));

    let recorded = test.api.tags(&status.arn);
    assert_eq!(
        recorded.get(tags::MANAGED_BY).map(String::as_str),
        Some(test.cloud.managed_by().as_str())
    );
    assert_eq!(
        recorded.get(tags::K8S_SERVICE_NAME).map(String::as_str),
        Some("checkout-svc")
    );
    assert_eq!(
        recorded.get(tags::K8S_ROUTE_NAME).map(String::as_str),
        Some("checkout")
    );
}

#[tokio::test]
async fn failed_target_group_is_treated_as_absent() {
    let test = TestConfig::default();
    let tg = mk_target_group("tg", "checkout-svc", "checkout");
    let failed = test.api.seed_target_group(
        &tg.spec.name(false),
        mk_tg_config(),
        ResourceStatus::CreateFailed,
        test.owned(),
    );
    let mut stack = mk_stack(vec![tg.into()]);

    test.deployer().deploy(&mut stack).await.expect("deploy");

    let status = stack.get::<TargetGroup>("tg").unwrap().status.clone().unwrap();
    assert_ne!(status.id, failed.id);
    assert_eq!(test.api.calls("create_target_group"), 1);
}

#[rstest]
#[case(ResourceStatus::CreateInProgress)]
#[case(ResourceStatus::UpdateInProgress)]
#[case(ResourceStatus::DeleteInProgress)]
#[case(ResourceStatus::UpdateFailed)]
#[case(ResourceStatus::DeleteFailed)]
#[tokio::test]
async fn transitional_target_group_is_retried(#[case] status: ResourceStatus) {
    let test = TestConfig::default();
    let tg = mk_target_group("tg", "checkout-svc", "checkout");
    test.api
        .seed_target_group(&tg.spec.name(false), mk_tg_config(), status, test.owned());
    test.api.clear_calls();

    let error = TargetGroupManager::new(test.api(), test.cloud.clone())
        .upsert(&tg.spec)
        .await
        .expect_err("only an active target group may be used");

    assert!(error.is_retry(), "{error}");
    assert_eq!(test.api.mutations(), 0);
    assert_eq!(test.api.target_groups().len(), 1);
}

#[tokio::test]
async fn target_group_owned_elsewhere_is_not_adopted() {
    let test = TestConfig::default();
    let tg = mk_target_group("tg", "checkout-svc", "checkout");
    test.api.seed_target_group(
        &tg.spec.name(false),
        mk_tg_config(),
        ResourceStatus::Active,
        foreign_owner(),
    );
    let mut stack = mk_stack(vec![tg.into()]);

    let error = test.deployer().deploy(&mut stack).await.unwrap_err();
    assert!(error.to_string().contains("not managed"), "{error}");
    assert_eq!(test.api.calls("create_target_group"), 0);
}

#[tokio::test]
async fn updates_changed_health_check() {
    let test = TestConfig::default();
    let mut tg = mk_target_group("tg", "checkout-svc", "checkout");
    test.api.seed_target_group(
        &tg.spec.name(false),
        mk_tg_config(),
        ResourceStatus::Active,
        test.cloud.merge_default_tags(tg.spec.provenance_tags()),
    );
    let health_check = HealthCheckConfig {
        enabled: true,
        path: Some("/healthz".to_string()),
        ..Default::default()
    };
    tg.spec.config.health_check = Some(health_check.clone());
    let mut stack = mk_stack(vec![tg.into()]);

    test.deployer().deploy(&mut stack).await.expect("deploy");
    test.deployer().deploy(&mut stack).await.expect("deploy");

    assert_eq!(test.api.calls("update_target_group_health_check"), 1);
    assert_eq!(
        test.api.target_groups()[0].health_check,
        Some(health_check)
    );
}

#[tokio::test]
async fn deletion_waits_until_targets_are_unused() {
    let test = TestConfig::default();
    let mut stack = mk_stack(vec![
        mk_target_group("tg", "checkout-svc", "checkout").into(),
        mk_targets("tg-targets", "tg", &[("10.0.0.1", 8080)]).into(),
    ]);
    test.deployer().deploy(&mut stack).await.expect("deploy");
    let id = stack.get::<TargetGroup>("tg").unwrap().status.clone().unwrap().id;

    stack.get_mut::<TargetGroup>("tg").unwrap().spec.is_deleted = true;
    test.api.clear_calls();
    let error = test.deployer().deploy(&mut stack).await.unwrap_err();
    assert!(error.is_retry(), "{error}");
    assert_eq!(test.api.calls("deregister_targets"), 0);
    assert_eq!(test.api.calls("delete_target_group"), 0);

    test.api.set_target_status(&id, TargetStatus::Unused);
    test.deployer().deploy(&mut stack).await.expect("deploy");
    assert_eq!(test.api.calls("deregister_targets"), 1);
    assert!(test.api.target_groups().is_empty());
}

#[tokio::test]
async fn collects_target_groups_whose_route_no_longer_uses_them() {
    let test = TestConfig::default();
    test.kube.set_route(RouteKind::Http, NS, "checkout", mk_route(&["checkout-svc"]));
    test.kube.set_route(
        RouteKind::Http,
        NS,
        "cart",
        RouteBackends {
            deleting: true,
            backends: vec![mk_backend("cart-svc")],
        },
    );

    // Still referenced by its route.
    test.seed_route_target_group("checkout-svc", "checkout");
    // The route no longer refers to this backend.
    test.seed_route_target_group("legacy-svc", "checkout");
    // The route is gone.
    test.seed_route_target_group("orders-svc", "orders");
    // The route is being deleted.
    test.seed_route_target_group("cart-svc", "cart");
    // Not ours.
    test.api.seed_target_group(
        "k8s-billing-svc-shop-http-http1",
        mk_tg_config(),
        ResourceStatus::Active,
        mk_provenance("billing-svc", "billing").to_tags(),
    );

    let mut stack = mk_stack(vec![]);
    test.deployer().deploy(&mut stack).await.expect("deploy");

    assert_eq!(
        test.target_group_names(),
        vec![
            "k8s-billing-svc-shop-http-http1".to_string(),
            "k8s-checkout-svc-shop-http-http1".to_string(),
        ]
    );
}

#[tokio::test]
async fn keeps_exported_target_group_while_export_exists() {
    let test = TestConfig::default();
    test.kube.add_export(NS, "inventory");
    for service in ["inventory", "payments"] {
        let provenance = TargetGroupTagFields {
            source: Some(TargetGroupSource::ServiceExport),
            cluster_name: Some(CLUSTER.to_string()),
            service_name: Some(service.to_string()),
            service_namespace: Some(NS.to_string()),
            route_name: None,
            route_namespace: None,
        };
        test.api.seed_target_group(
            &format!("k8s-{service}-{NS}-export"),
            mk_tg_config(),
            ResourceStatus::Active,
            test.cloud.merge_default_tags(provenance.to_tags()),
        );
    }

    let mut stack = mk_stack(vec![]);
    test.deployer().deploy(&mut stack).await.expect("deploy");

    assert_eq!(
        test.target_group_names(),
        vec![format!("k8s-inventory-{NS}-export")]
    );
}

#[tokio::test]
async fn target_group_used_by_a_rule_is_collected_later() {
    let test = TestConfig::default();
    let mut stack = mk_route_stack();
    test.deployer().deploy(&mut stack).await.expect("deploy");
    let listener = stack.get::<Listener>("l80").unwrap().status.clone().unwrap();

    // An unmanaged copy of a desired rule is never pruned and still forwards to a stale
    // target group.
    test.seed_route_target_group("legacy-svc", "checkout");
    let legacy = test
        .api
        .target_groups()
        .into_iter()
        .find(|tg| tg.summary.name.starts_with("k8s-legacy-svc"))
        .unwrap();
    test.api.seed_rule(
        &listener.service_id,
        &listener.id,
        50,
        mk_prefix("/a"),
        RuleAction::Forward(vec![WeightedTargetGroup {
            target_group_id: legacy.summary.id.clone(),
            weight: 1,
        }]),
        Tags::new(),
    );
    test.deployer().deploy(&mut mk_route_stack()).await.expect("deploy");
    assert_eq!(test.api.target_groups().len(), 2);
}
