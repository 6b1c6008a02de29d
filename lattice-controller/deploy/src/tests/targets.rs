use super::*;
use lattice_controller_core::api::TargetStatus;
use pretty_assertions::assert_eq;

fn mk_target_stack(targets: &[(&str, u16)]) -> Stack {
    mk_stack(vec![
        mk_target_group("tg", "checkout-svc", "checkout").into(),
        mk_targets("tg-targets", "tg", targets).into(),
    ])
}

fn registered(test: &TestConfig, stack: &Stack) -> Vec<Target> {
    let id = stack.get::<TargetGroup>("tg").unwrap().status.clone().unwrap().id;
    test.api.targets(&id).into_keys().collect()
}

#[tokio::test]
async fn deregisters_stale_targets_before_registering_new_ones() {
    let test = TestConfig::default();
    let mut stack = mk_target_stack(&[("10.0.0.1", 8080), ("10.0.0.2", 8080)]);
    test.deployer().deploy(&mut stack).await.expect("deploy");

    let mut stack = mk_target_stack(&[("10.0.0.2", 8080), ("10.0.0.3", 8080)]);
    test.api.clear_calls();
    test.deployer().deploy(&mut stack).await.expect("deploy");

    assert_eq!(
        test.api.mutation_log(),
        vec!["deregister_targets", "register_targets"]
    );
    assert_eq!(
        registered(&test, &stack),
        vec![Target::new("10.0.0.2", 8080), Target::new("10.0.0.3", 8080)]
    );
}

#[tokio::test]
async fn unchanged_targets_are_left_alone() {
    let test = TestConfig::default();
    let mut stack = mk_target_stack(&[("10.0.0.1", 8080)]);
    test.deployer().deploy(&mut stack).await.expect("deploy");

    test.api.clear_calls();
    test.deployer().deploy(&mut stack).await.expect("deploy");
    assert_eq!(test.api.mutations(), 0);
}

#[tokio::test]
async fn draining_targets_are_registered_again() {
    let test = TestConfig::default();
    let mut stack = mk_target_stack(&[("10.0.0.1", 8080)]);
    test.deployer().deploy(&mut stack).await.expect("deploy");
    let id = stack.get::<TargetGroup>("tg").unwrap().status.clone().unwrap().id;

    test.api.set_target_status(&id, TargetStatus::Draining);
    test.deployer().deploy(&mut stack).await.expect("deploy");

    assert_eq!(test.api.calls("register_targets"), 2);
    assert_eq!(test.api.calls("deregister_targets"), 0);
    assert_eq!(
        test.api.targets(&id).into_values().collect::<Vec<_>>(),
        vec![TargetStatus::Healthy]
    );
}

#[tokio::test]
async fn rejected_registrations_are_retried() {
    let test = TestConfig::with_api(FakeApi::with_knobs(|k| k.fail_registration = true));
    let mut stack = mk_target_stack(&[("10.0.0.1", 8080)]);

    let error = test.deployer().deploy(&mut stack).await.unwrap_err();
    assert!(error.is_retry(), "{error}");
    assert!(registered(&test, &stack).is_empty());
}

#[tokio::test]
async fn targets_wait_for_their_target_group() {
    let test = TestConfig::default();
    let mut stack = mk_stack(vec![mk_targets("tg-targets", "tg", &[("10.0.0.1", 8080)]).into()]);

    let error = test.deployer().deploy(&mut stack).await.unwrap_err();
    assert!(error.is_retry(), "{error}");
    assert_eq!(test.api.calls("register_targets"), 0);
}
