use super::{Failures, Synthesize};
use crate::{manager::ServiceManager, ReconciliationCache, RemoteRef};
use async_trait::async_trait;
use lattice_controller_core::{
    model::{Service, ServiceSpec, ServiceStatus},
    DnsEndpointPublisher, Error, ResourceKind, ResourceStatus, Result, Stack,
};
use std::sync::Arc;

/// Synthesizes services and publishes custom domain names for active ones.
pub struct ServiceSynthesizer {
    manager: ServiceManager,
    dns: Arc<dyn DnsEndpointPublisher>,
}

impl ServiceSynthesizer {
    pub fn new(manager: ServiceManager, dns: Arc<dyn DnsEndpointPublisher>) -> Self {
        Self { manager, dns }
    }

    async fn publish_dns(&self, spec: &ServiceSpec, status: &ServiceStatus) -> Result<()> {
        if status.remote_status != ResourceStatus::Active {
            return Ok(());
        }
        match (&spec.custom_domain_name, &status.dns_name) {
            (Some(custom), Some(dns_name)) => self
                .dns
                .publish(custom, dns_name)
                .await
                .map_err(Error::Dns),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Synthesize for ServiceSynthesizer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Service
    }

    async fn synthesize(&self, stack: &mut Stack, cache: &ReconciliationCache) -> Result<()> {
        let mut failures = Failures::new(self.kind());
        for id in stack.ids::<Service>() {
            let spec = stack.get::<Service>(&id)?.spec.clone();
            if spec.is_deleted {
                continue;
            }
            let status = match self.manager.upsert(&spec, cache).await {
                Ok(status) => status,
                Err(error) => {
                    failures.record(&id, error);
                    continue;
                }
            };
            cache.put_service(
                &id,
                RemoteRef {
                    arn: status.arn.clone(),
                    id: status.id.clone(),
                    name: spec.lattice_name(),
                },
            );
            if let Err(error) = self.publish_dns(&spec, &status).await {
                failures.record(&id, error);
            }
            stack.get_mut::<Service>(&id)?.status = Some(status);
        }
        failures.finish()
    }

    async fn post_synthesize(&self, stack: &mut Stack, _cache: &ReconciliationCache) -> Result<()> {
        let mut failures = Failures::new(self.kind());
        for service in stack.list::<Service>().filter(|s| s.spec.is_deleted) {
            if let Err(error) = self.manager.delete(&service.spec).await {
                failures.record(&service.meta.id, error);
            }
        }
        failures.finish()
    }
}
