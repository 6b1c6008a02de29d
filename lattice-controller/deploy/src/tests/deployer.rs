use super::*;
use crate::synthesizer::Synthesize;
use async_trait::async_trait;
use lattice_controller_core::{Error, ResourceKind, Result};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn converges_route_stack_in_one_pass() {
    let test = TestConfig::default();
    let mut stack = mk_route_stack();

    test.deployer().deploy(&mut stack).await.expect("deploy");

    assert_eq!(test.api.service_networks().len(), 1);
    assert_eq!(test.api.vpc_associations().len(), 1);
    assert_eq!(test.api.services().len(), 1);
    assert_eq!(test.api.service_associations().len(), 1);
    assert_eq!(test.api.target_groups().len(), 1);
    let listeners = test.api.listeners();
    assert_eq!(listeners.len(), 1);
    let mut priorities = test
        .api
        .rules(&listeners[0].id)
        .into_iter()
        .map(|r| r.priority)
        .collect::<Vec<_>>();
    priorities.sort_unstable();
    assert_eq!(priorities, vec![1, 2]);

    let tg = stack.get::<TargetGroup>("tg").unwrap().status.clone().unwrap();
    assert_eq!(test.api.targets(&tg.id).len(), 2);
    assert_eq!(test.metrics.deploy_count("success"), 1);
}

#[tokio::test]
async fn converged_stack_needs_no_mutations() {
    let test = TestConfig::default();
    test.deployer()
        .deploy(&mut mk_route_stack())
        .await
        .expect("deploy");

    test.api.clear_calls();
    let mut stack = mk_route_stack();
    test.deployer().deploy(&mut stack).await.expect("deploy");

    assert_eq!(test.api.mutation_log(), Vec::<&str>::new());
    assert_eq!(test.metrics.deploy_count("success"), 2);
    for id in ["r1", "r2"] {
        let rule = stack.get::<Rule>(id).unwrap();
        assert!(!rule.status.as_ref().unwrap().priority_update_needed);
    }
}

#[tokio::test]
async fn deletes_route_stack_in_reverse_order() {
    let test = TestConfig::default();
    let mut stack = mk_route_stack();
    test.deployer().deploy(&mut stack).await.expect("deploy");
    let tg = stack.get::<TargetGroup>("tg").unwrap().status.clone().unwrap();

    stack.get_mut::<Service>("svc").unwrap().spec.is_deleted = true;
    stack.get_mut::<TargetGroup>("tg").unwrap().spec.is_deleted = true;
    stack.get_mut::<ServiceNetwork>("default").unwrap().spec.is_deleted = true;
    test.api.set_target_status(&tg.id, lattice_controller_core::api::TargetStatus::Unused);

    // Associations are deleted first and must be gone before their parents.
    let error = test.deployer().deploy(&mut stack).await.unwrap_err();
    assert!(error.is_retry(), "{error}");
    test.deployer().deploy(&mut stack).await.expect("deploy");

    assert!(test.api.services().is_empty());
    assert!(test.api.target_groups().is_empty());
    assert!(test.api.service_networks().is_empty());
}

/// Records the order in which synthesizers run.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

struct Scripted {
    kind: ResourceKind,
    journal: Journal,
    synthesize: fn() -> Result<()>,
    post_synthesize: fn() -> Result<()>,
}

impl Journal {
    fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    fn scripted(&self, kind: ResourceKind) -> Scripted {
        Scripted {
            kind,
            journal: self.clone(),
            synthesize: || Ok(()),
            post_synthesize: || Ok(()),
        }
    }
}

#[async_trait]
impl Synthesize for Scripted {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn synthesize(&self, _: &mut Stack, _: &ReconciliationCache) -> Result<()> {
        self.journal.0.lock().push(format!("synthesize {}", self.kind));
        (self.synthesize)()
    }

    async fn post_synthesize(&self, _: &mut Stack, _: &ReconciliationCache) -> Result<()> {
        self.journal.0.lock().push(format!("post {}", self.kind));
        (self.post_synthesize)()
    }
}

fn mk_scripted_deployer(synthesizers: Vec<Scripted>, metrics: DeployMetrics) -> StackDeployer {
    StackDeployer::with_synthesizers(
        synthesizers
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn Synthesize>)
            .collect(),
        metrics,
    )
}

#[tokio::test]
async fn stops_at_first_failed_synthesizer() {
    let test = TestConfig::default();
    let journal = Journal::default();
    let failing = Scripted {
        synthesize: || Err(Error::retry("not ready")),
        ..journal.scripted(ResourceKind::TargetGroup)
    };
    let deployer = mk_scripted_deployer(
        vec![
            journal.scripted(ResourceKind::ServiceNetwork),
            failing,
            journal.scripted(ResourceKind::Service),
        ],
        test.metrics.clone(),
    );

    let error = deployer.deploy(&mut mk_stack(vec![])).await.unwrap_err();

    assert!(error.is_retry(), "{error}");
    assert_eq!(
        journal.entries(),
        vec![
            format!("synthesize {}", ResourceKind::ServiceNetwork),
            format!("synthesize {}", ResourceKind::TargetGroup),
        ]
    );
    assert_eq!(test.metrics.deploy_count("retry"), 1);
}

#[tokio::test]
async fn post_synthesis_runs_in_reverse_and_aggregates_failures() {
    let test = TestConfig::default();
    let journal = Journal::default();
    let deployer = mk_scripted_deployer(
        vec![
            Scripted {
                post_synthesize: || Err(Error::conflict("still associated")),
                ..journal.scripted(ResourceKind::ServiceNetwork)
            },
            journal.scripted(ResourceKind::TargetGroup),
            Scripted {
                post_synthesize: || Err(Error::retry("draining")),
                ..journal.scripted(ResourceKind::Service)
            },
        ],
        test.metrics.clone(),
    );

    let error = deployer.deploy(&mut mk_stack(vec![])).await.unwrap_err();

    assert!(error.is_retry(), "{error}");
    // The network's conflict ran last, so it is the cause.
    assert!(error.is_conflict(), "{error}");
    let message = error.to_string();
    assert!(message.contains("still associated"), "{message}");
    assert!(message.contains("draining"), "{message}");
    let posts = journal
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("post"))
        .collect::<Vec<_>>();
    assert_eq!(
        posts,
        vec![
            format!("post {}", ResourceKind::Service),
            format!("post {}", ResourceKind::TargetGroup),
            format!("post {}", ResourceKind::ServiceNetwork),
        ]
    );
}

#[tokio::test]
async fn fatal_post_synthesis_error_is_not_retried() {
    let test = TestConfig::default();
    let journal = Journal::default();
    let deployer = mk_scripted_deployer(
        vec![Scripted {
            post_synthesize: || Err(Error::InvalidRuleId("rule-0".to_string())),
            ..journal.scripted(ResourceKind::Rule)
        }],
        test.metrics.clone(),
    );

    let error = deployer.deploy(&mut mk_stack(vec![])).await.unwrap_err();

    assert!(matches!(error, Error::InvalidRuleId(_)), "{error}");
    assert_eq!(test.metrics.deploy_count("error"), 1);
}
