use lattice_controller_core::{
    api::{Target, TargetStatus},
    model::TargetsSpec,
    Error, NetworkingApi, Result,
};
use std::{collections::BTreeSet, sync::Arc};
use tracing::info;

/// Reconciles the set of targets registered with a target group.
#[derive(Clone)]
pub struct TargetsManager {
    api: Arc<dyn NetworkingApi>,
}

impl TargetsManager {
    pub fn new(api: Arc<dyn NetworkingApi>) -> Self {
        Self { api }
    }

    /// Deregisters stale targets and then registers missing ones.
    ///
    /// Draining targets count as unregistered, so a draining target that is desired again is
    /// re-registered.
    pub async fn update(&self, spec: &TargetsSpec, target_group_id: &str) -> Result<()> {
        let current = self
            .api
            .list_targets(target_group_id)
            .await?
            .into_iter()
            .filter(|t| t.status != TargetStatus::Draining)
            .map(|t| t.target)
            .collect::<BTreeSet<_>>();
        let desired = spec.targets.iter().cloned().collect::<BTreeSet<_>>();

        let stale = current.difference(&desired).cloned().collect::<Vec<Target>>();
        let missing = desired.difference(&current).cloned().collect::<Vec<Target>>();

        if !stale.is_empty() {
            info!(target_group = %target_group_id, targets = stale.len(), "Deregistering targets");
            let failures = self
                .api
                .deregister_targets(target_group_id, stale)
                .await?;
            if !failures.is_empty() {
                return Err(Error::retry(format!(
                    "failed to deregister {} target(s) from {target_group_id}",
                    failures.len()
                )));
            }
        }

        if !missing.is_empty() {
            info!(target_group = %target_group_id, targets = missing.len(), "Registering targets");
            let failures = self
                .api
                .register_targets(target_group_id, missing)
                .await?;
            if !failures.is_empty() {
                return Err(Error::retry(format!(
                    "failed to register {} target(s) with {target_group_id}",
                    failures.len()
                )));
            }
        }

        Ok(())
    }
}
