use super::{Failures, Synthesize};
use crate::{manager::TargetsManager, ReconciliationCache};
use async_trait::async_trait;
use lattice_controller_core::{
    model::{TargetGroup, Targets},
    ResourceKind, Result, Stack,
};

pub struct TargetsSynthesizer {
    manager: TargetsManager,
}

impl TargetsSynthesizer {
    pub fn new(manager: TargetsManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Synthesize for TargetsSynthesizer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Targets
    }

    async fn synthesize(&self, stack: &mut Stack, cache: &ReconciliationCache) -> Result<()> {
        let mut failures = Failures::new(self.kind());
        for targets in stack.list::<Targets>() {
            let id = &targets.meta.id;
            let target_group_id = &targets.spec.stack_target_group_id;
            match stack.get::<TargetGroup>(target_group_id) {
                Ok(tg) if tg.spec.is_deleted => continue,
                Ok(_) => {}
                Err(error) => {
                    failures.record(id, error);
                    continue;
                }
            }
            let result = match cache.target_group(target_group_id) {
                Ok(remote) => self.manager.update(&targets.spec, &remote.id).await,
                Err(error) => Err(error),
            };
            if let Err(error) = result {
                failures.record(id, error);
            }
        }
        failures.finish()
    }
}
