use super::{Failures, Synthesize};
use crate::{manager::AccessLogSubscriptionManager, ReconciliationCache};
use async_trait::async_trait;
use lattice_controller_core::{model::AccessLogSubscription, ResourceKind, Result, Stack};

pub struct AccessLogSubscriptionSynthesizer {
    manager: AccessLogSubscriptionManager,
}

impl AccessLogSubscriptionSynthesizer {
    pub fn new(manager: AccessLogSubscriptionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Synthesize for AccessLogSubscriptionSynthesizer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::AccessLogSubscription
    }

    async fn synthesize(&self, stack: &mut Stack, cache: &ReconciliationCache) -> Result<()> {
        let mut failures = Failures::new(self.kind());
        for id in stack.ids::<AccessLogSubscription>() {
            let spec = stack.get::<AccessLogSubscription>(&id)?.spec.clone();
            if spec.is_deleted {
                continue;
            }
            let result = match &spec.existing_arn {
                Some(arn) => self.manager.update(arn, &spec, cache).await,
                None => self.manager.create(&spec, cache).await,
            };
            match result {
                Ok(status) => stack.get_mut::<AccessLogSubscription>(&id)?.status = Some(status),
                Err(error) => failures.record(&id, error),
            }
        }
        failures.finish()
    }

    async fn post_synthesize(&self, stack: &mut Stack, _cache: &ReconciliationCache) -> Result<()> {
        let mut failures = Failures::new(self.kind());
        for als in stack
            .list::<AccessLogSubscription>()
            .filter(|als| als.spec.is_deleted)
        {
            if let Some(arn) = &als.spec.existing_arn {
                if let Err(error) = self.manager.delete(arn).await {
                    failures.record(&als.meta.id, error);
                }
            }
        }
        failures.finish()
    }
}
