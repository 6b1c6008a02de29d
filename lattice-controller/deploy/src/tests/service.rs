use super::*;
use crate::manager::ServiceManager;
use lattice_controller_core::{model::Service, tags::MANAGED_BY, ResourceStatus};
use pretty_assertions::assert_eq;

fn manager(test: &TestConfig) -> ServiceManager {
    ServiceManager::new(test.api(), test.cloud.clone())
}

fn owned_network(test: &TestConfig, name: &str) -> String {
    test.api
        .seed_service_network(name, ACCOUNT, test.owned())
        .id
}

fn associated_networks(test: &TestConfig) -> Vec<String> {
    let mut names = test
        .api
        .service_associations()
        .into_iter()
        .map(|a| a.service_network_name)
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[tokio::test]
async fn creates_tagged_service_with_associations() {
    let test = TestConfig::default();
    owned_network(&test, "a");
    owned_network(&test, "b");
    let service = mk_service("svc", "checkout", &["a", "b"]);

    let status = manager(&test)
        .upsert(&service.spec, &test.cache())
        .await
        .expect("upsert");

    let services = test.api.services();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].name, "checkout-shop");
    assert_eq!(status.id, services[0].id);
    assert!(status.dns_name.is_some());

    let tags = test.api.tags(&services[0].arn);
    assert_eq!(tags.get(MANAGED_BY), Some(&test.cloud.managed_by()));
    assert_eq!(
        tags.get(lattice_controller_core::tags::K8S_ROUTE_NAME),
        Some(&"checkout".to_string())
    );
    assert_eq!(associated_networks(&test), vec!["a", "b"]);
}

#[tokio::test]
async fn reconciles_associations_as_a_set_difference() {
    let test = TestConfig::default();
    let a = owned_network(&test, "a");
    let b = owned_network(&test, "b");
    owned_network(&test, "c");
    let existing = test
        .api
        .seed_service("checkout-shop", ResourceStatus::Active, test.owned());
    test.api
        .seed_service_association(&existing.id, &a, ResourceStatus::Active, test.owned());
    test.api
        .seed_service_association(&existing.id, &b, ResourceStatus::Active, test.owned());

    let service = mk_service("svc", "checkout", &["b", "c"]);
    manager(&test)
        .upsert(&service.spec, &test.cache())
        .await
        .expect("upsert");

    assert_eq!(associated_networks(&test), vec!["b", "c"]);
    assert_eq!(test.api.calls("create_service_association"), 1);
    assert_eq!(test.api.calls("delete_service_association"), 1);
}

#[tokio::test]
async fn deleting_association_blocks_reassociation() {
    let test = TestConfig::default();
    let a = owned_network(&test, "a");
    owned_network(&test, "b");
    let existing = test
        .api
        .seed_service("checkout-shop", ResourceStatus::Active, test.owned());
    test.api.seed_service_association(
        &existing.id,
        &a,
        ResourceStatus::DeleteInProgress,
        test.owned(),
    );
    test.api.clear_calls();

    let service = mk_service("svc", "checkout", &["a", "b"]);
    let error = manager(&test)
        .upsert(&service.spec, &test.cache())
        .await
        .expect_err("must wait for the deletion to finish");

    assert!(error.is_retry(), "{error}");
    assert_eq!(test.api.calls("create_service_association"), 0);
    assert_eq!(test.api.mutations(), 0);
    assert_eq!(associated_networks(&test), vec!["a"]);
}

#[tokio::test]
async fn unowned_associations_are_left_in_place() {
    let test = TestConfig::default();
    let other = owned_network(&test, "other");
    owned_network(&test, "a");
    let existing = test
        .api
        .seed_service("checkout-shop", ResourceStatus::Active, test.owned());
    test.api.seed_service_association(
        &existing.id,
        &other,
        ResourceStatus::Active,
        foreign_owner(),
    );

    let service = mk_service("svc", "checkout", &["a"]);
    manager(&test)
        .upsert(&service.spec, &test.cache())
        .await
        .expect("upsert");

    assert_eq!(associated_networks(&test), vec!["a", "other"]);
    assert_eq!(test.api.calls("delete_service_association"), 0);
}

#[tokio::test]
async fn adopts_untagged_service_once() {
    let test = TestConfig::default();
    owned_network(&test, "a");
    let existing = test
        .api
        .seed_service("checkout-shop", ResourceStatus::Active, Tags::new());
    let service = mk_service("svc", "checkout", &["a"]);
    let manager = manager(&test);

    manager
        .upsert(&service.spec, &test.cache())
        .await
        .expect("upsert");
    assert_eq!(test.api.calls("tag_resource"), 1);
    assert!(test.cloud.is_managed(&test.api.tags(&existing.arn)));

    test.api.clear_calls();
    manager
        .upsert(&service.spec, &test.cache())
        .await
        .expect("upsert");
    assert_eq!(test.api.mutations(), 0);
}

#[tokio::test]
async fn service_owned_elsewhere_is_a_conflict() {
    let test = TestConfig::default();
    test.api
        .seed_service("checkout-shop", ResourceStatus::Active, foreign_owner());
    test.api.clear_calls();

    let service = mk_service("svc", "checkout", &[]);
    let error = manager(&test)
        .upsert(&service.spec, &test.cache())
        .await
        .expect_err("must not adopt");
    assert!(error.is_conflict(), "{error}");
    assert_eq!(test.api.mutations(), 0);
}

#[tokio::test]
async fn in_progress_service_is_retried() {
    let test = TestConfig::default();
    test.api
        .seed_service("checkout-shop", ResourceStatus::CreateInProgress, test.owned());

    let service = mk_service("svc", "checkout", &[]);
    let error = manager(&test)
        .upsert(&service.spec, &test.cache())
        .await
        .unwrap_err();
    assert!(error.is_retry(), "{error}");
}

#[tokio::test]
async fn publishes_custom_domain_for_active_service() {
    let test = TestConfig::default();
    let mut service = mk_service("svc", "checkout", &[]);
    service.spec.custom_domain_name = Some("checkout.example.com".to_string());
    let mut stack = mk_stack(vec![service.into()]);

    test.deployer().deploy(&mut stack).await.expect("deploy");

    let status = stack.get::<Service>("svc").unwrap().status.clone().unwrap();
    assert_eq!(
        test.dns.published(),
        vec![(
            "checkout.example.com".to_string(),
            status.dns_name.expect("dns name")
        )]
    );
}

#[tokio::test]
async fn deletes_service_after_its_associations() {
    let test = TestConfig::default();
    owned_network(&test, "a");
    let mut stack = mk_stack(vec![mk_service("svc", "checkout", &["a"]).into()]);
    test.deployer().deploy(&mut stack).await.expect("deploy");

    stack.get_mut::<Service>("svc").unwrap().spec.is_deleted = true;

    let error = test.deployer().deploy(&mut stack).await.unwrap_err();
    assert!(error.is_retry(), "{error}");
    assert!(test.api.service_associations().is_empty());
    assert_eq!(test.api.services().len(), 1);

    test.deployer().deploy(&mut stack).await.expect("deploy");
    assert!(test.api.services().is_empty());
}
