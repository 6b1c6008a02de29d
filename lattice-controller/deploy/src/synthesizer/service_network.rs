use super::{Failures, Synthesize};
use crate::{manager::ServiceNetworkManager, ReconciliationCache};
use async_trait::async_trait;
use lattice_controller_core::{model::ServiceNetwork, ResourceKind, Result, Stack};

pub struct ServiceNetworkSynthesizer {
    manager: ServiceNetworkManager,
}

impl ServiceNetworkSynthesizer {
    pub fn new(manager: ServiceNetworkManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Synthesize for ServiceNetworkSynthesizer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ServiceNetwork
    }

    async fn synthesize(&self, stack: &mut Stack, cache: &ReconciliationCache) -> Result<()> {
        let mut failures = Failures::new(self.kind());
        for id in stack.ids::<ServiceNetwork>() {
            let spec = stack.get::<ServiceNetwork>(&id)?.spec.clone();
            if spec.is_deleted {
                continue;
            }
            match self.manager.create_or_update(&spec, cache).await {
                Ok(status) => stack.get_mut::<ServiceNetwork>(&id)?.status = Some(status),
                Err(error) => failures.record(&id, error),
            }
        }
        failures.finish()
    }

    async fn post_synthesize(&self, stack: &mut Stack, _cache: &ReconciliationCache) -> Result<()> {
        let mut failures = Failures::new(self.kind());
        for network in stack.list::<ServiceNetwork>().filter(|sn| sn.spec.is_deleted) {
            if let Err(error) = self.manager.delete(&network.spec.name).await {
                failures.record(&network.meta.id, error);
            }
        }
        failures.finish()
    }
}
