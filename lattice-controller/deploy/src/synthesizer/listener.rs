use super::{resolve_action, Failures, Synthesize};
use crate::{
    manager::{ListenerManager, TargetGroupManager},
    ReconciliationCache, RemoteListener,
};
use async_trait::async_trait;
use lattice_controller_core::{
    api::RuleAction,
    model::{DefaultAction, Listener, Service},
    ResourceKind, Result, Stack,
};

/// Synthesizes listeners and removes listeners that are no longer desired from the stack's
/// services.
pub struct ListenerSynthesizer {
    manager: ListenerManager,
    target_groups: TargetGroupManager,
}

impl ListenerSynthesizer {
    pub fn new(manager: ListenerManager, target_groups: TargetGroupManager) -> Self {
        Self {
            manager,
            target_groups,
        }
    }

    async fn default_action(
        &self,
        action: &DefaultAction,
        cache: &ReconciliationCache,
    ) -> Result<RuleAction> {
        match action {
            DefaultAction::FixedResponse { status_code } => Ok(RuleAction::FixedResponse {
                status_code: *status_code,
            }),
            DefaultAction::Forward(targets) => {
                resolve_action(targets, cache, &self.target_groups).await
            }
        }
    }

    async fn prune(&self, stack: &Stack, cache: &ReconciliationCache, failures: &mut Failures) {
        for service in stack.list::<Service>().filter(|s| !s.spec.is_deleted) {
            let Ok(remote) = cache.service(&service.meta.id) else {
                continue;
            };
            let desired = stack
                .list::<Listener>()
                .filter(|l| l.spec.stack_service_id == service.meta.id)
                .map(|l| (l.spec.port, l.spec.protocol))
                .collect::<Vec<_>>();
            let listeners = match self.manager.list(&remote.id).await {
                Ok(listeners) => listeners,
                Err(error) => {
                    failures.record(&service.meta.id, error);
                    continue;
                }
            };
            for listener in listeners
                .iter()
                .filter(|l| !desired.contains(&(l.port, l.protocol)))
            {
                if let Err(error) = self.manager.delete(listener, &remote.id).await {
                    failures.record(&listener.name, error);
                }
            }
        }
    }
}

#[async_trait]
impl Synthesize for ListenerSynthesizer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Listener
    }

    async fn synthesize(&self, stack: &mut Stack, cache: &ReconciliationCache) -> Result<()> {
        let mut failures = Failures::new(self.kind());
        for id in stack.ids::<Listener>() {
            let spec = stack.get::<Listener>(&id)?.spec.clone();
            if stack
                .get::<Service>(&spec.stack_service_id)
                .map(|s| s.spec.is_deleted)
                .unwrap_or(false)
            {
                continue;
            }

            let result = async {
                let service = cache.service(&spec.stack_service_id)?;
                let action = self.default_action(&spec.default_action, cache).await?;
                self.manager.upsert(&spec, &service.id, action).await
            }
            .await;
            match result {
                Ok(status) => {
                    cache.put_listener(
                        &id,
                        RemoteListener {
                            arn: status.arn.clone(),
                            id: status.id.clone(),
                            service_id: status.service_id.clone(),
                        },
                    );
                    stack.get_mut::<Listener>(&id)?.status = Some(status);
                }
                Err(error) => failures.record(&id, error),
            }
        }

        self.prune(stack, cache, &mut failures).await;
        failures.finish()
    }
}
