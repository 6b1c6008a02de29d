use super::{resolve_action, Failures, Synthesize};
use crate::{
    manager::{is_equivalent_match, RuleManager, TargetGroupManager},
    ReconciliationCache, RemoteListener,
};
use async_trait::async_trait;
use lattice_controller_core::{
    api::RulePriorityUpdate,
    model::{Listener, Rule, Service},
    Error, ResourceKind, Result, Stack,
};
use std::collections::HashSet;

/// Synthesizes the rules of each listener, prunes stale rules and then moves rules to their
/// desired priorities.
pub struct RuleSynthesizer {
    manager: RuleManager,
    target_groups: TargetGroupManager,
}

impl RuleSynthesizer {
    pub fn new(manager: RuleManager, target_groups: TargetGroupManager) -> Self {
        Self {
            manager,
            target_groups,
        }
    }

    async fn synthesize_listener(
        &self,
        stack: &mut Stack,
        listener: &RemoteListener,
        rule_ids: &[String],
        cache: &ReconciliationCache,
        failures: &mut Failures,
    ) -> Result<()> {
        let mut synthesized = Vec::with_capacity(rule_ids.len());
        let mut failed = Vec::new();
        for id in rule_ids {
            let spec = stack.get::<Rule>(id)?.spec.clone();
            let result = async {
                let priority = spec.priority()?;
                let action = resolve_action(&spec.targets, cache, &self.target_groups).await?;
                let status = self.manager.upsert(&spec, action, listener).await?;
                Ok::<_, Error>((priority, status))
            }
            .await;
            match result {
                Ok((priority, status)) => {
                    synthesized.push((id.clone(), status.id.clone(), priority));
                    stack.get_mut::<Rule>(id)?.status = Some(status);
                }
                Err(error) => {
                    failed.push(id.clone());
                    failures.record(id, error);
                }
            }
        }
        self.prune(stack, listener, &failed, &synthesized).await?;

        // Priorities are only moved once every rule on the listener exists remotely.
        if !failed.is_empty() {
            return Ok(());
        }

        let mut needs_update = false;
        for (id, _, _) in &synthesized {
            let rule = stack.get::<Rule>(id)?;
            needs_update |= rule.status.as_ref().map_or(false, |s| s.priority_update_needed);
        }
        if !needs_update {
            return Ok(());
        }

        let updates = synthesized
            .iter()
            .map(|(_, remote_id, priority)| RulePriorityUpdate {
                rule_id: remote_id.clone(),
                priority: *priority,
            })
            .collect();
        self.manager.update_priorities(listener, updates).await?;
        for (id, _, priority) in &synthesized {
            if let Some(status) = stack.get_mut::<Rule>(id)?.status.as_mut() {
                status.priority = *priority;
                status.priority_update_needed = false;
            }
        }
        Ok(())
    }

    /// Deletes remote rules that no synthesized rule claimed.
    ///
    /// A remote rule whose match is equivalent to a desired rule that failed to synthesize is
    /// kept until the next pass. Extra copies of a synthesized rule's match are deleted.
    async fn prune(
        &self,
        stack: &Stack,
        listener: &RemoteListener,
        failed: &[String],
        synthesized: &[(String, String, u32)],
    ) -> Result<()> {
        let keep = synthesized
            .iter()
            .map(|(_, remote_id, _)| remote_id.as_str())
            .collect::<HashSet<_>>();
        let mut pending = Vec::with_capacity(failed.len());
        for id in failed {
            pending.push(&stack.get::<Rule>(id)?.spec.matcher);
        }

        for remote in self.manager.list(listener).await? {
            if keep.contains(remote.id.as_str()) {
                continue;
            }
            let details = self.manager.get(&remote.id, listener).await?;
            if pending
                .iter()
                .any(|matcher| is_equivalent_match(&details.matcher, matcher))
            {
                continue;
            }
            self.manager.delete(&remote, listener).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Synthesize for RuleSynthesizer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Rule
    }

    async fn synthesize(&self, stack: &mut Stack, cache: &ReconciliationCache) -> Result<()> {
        let mut failures = Failures::new(self.kind());

        for rule in stack.list::<Rule>() {
            if let Err(error) = stack.get::<Listener>(&rule.spec.stack_listener_id) {
                failures.record(&rule.meta.id, error);
            }
        }

        for listener_id in stack.ids::<Listener>() {
            let service_id = &stack.get::<Listener>(&listener_id)?.spec.stack_service_id;
            if stack
                .get::<Service>(service_id)
                .map(|s| s.spec.is_deleted)
                .unwrap_or(false)
            {
                continue;
            }
            let listener = match cache.listener(&listener_id) {
                Ok(listener) => listener,
                Err(error) => {
                    failures.record(&listener_id, error);
                    continue;
                }
            };
            let rule_ids = stack
                .list::<Rule>()
                .filter(|r| r.spec.stack_listener_id == listener_id)
                .map(|r| r.meta.id.clone())
                .collect::<Vec<_>>();
            if let Err(error) = self
                .synthesize_listener(stack, &listener, &rule_ids, cache, &mut failures)
                .await
            {
                failures.record(&listener_id, error);
            }
        }

        failures.finish()
    }
}
