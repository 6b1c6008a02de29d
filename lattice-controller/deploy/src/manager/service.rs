use crate::{ReconciliationCache, RemoteRef};
use lattice_controller_core::{
    api::{ApiError, CreateServiceAssociationRequest, CreateServiceRequest, ServiceSummary},
    model::{ServiceSpec, ServiceStatus},
    tags::{is_arn_managed, MANAGED_BY},
    CloudConfig, Error, NetworkingApi, ResourceStatus, Result,
};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{info, warn};

/// Manages services and their associations with service networks.
#[derive(Clone)]
pub struct ServiceManager {
    api: Arc<dyn NetworkingApi>,
    cloud: Arc<CloudConfig>,
}

/// Service network names to associate and disassociate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssociationDiff {
    pub to_create: Vec<String>,
    pub to_delete: Vec<String>,
}

impl ServiceManager {
    pub fn new(api: Arc<dyn NetworkingApi>, cloud: Arc<CloudConfig>) -> Self {
        Self { api, cloud }
    }

    /// Creates the service if it does not exist, or adopts and reconciles the existing one.
    pub async fn upsert(
        &self,
        spec: &ServiceSpec,
        cache: &ReconciliationCache,
    ) -> Result<ServiceStatus> {
        let name = spec.lattice_name();
        let service = match self.api.find_service(&name).await? {
            Some(service) => {
                self.ensure_owned(&service, spec).await?;
                if service.status.is_in_progress() || service.status.is_failed() {
                    return Err(Error::retry(format!("service {name} is {}", service.status)));
                }
                self.reconcile_associations(&service, &spec.service_network_names, cache)
                    .await?;
                service
            }
            None => {
                info!(%name, "Creating service");
                let service = self
                    .api
                    .create_service(CreateServiceRequest {
                        name: name.clone(),
                        custom_domain_name: spec.custom_domain_name.clone(),
                        certificate_arn: spec.certificate_arn.clone(),
                        tags: self.cloud.merge_default_tags(spec.provenance_tags()),
                    })
                    .await?;
                let diff = AssociationDiff::new(
                    spec.service_network_names.iter().map(String::as_str),
                    std::iter::empty(),
                );
                let mut last_error = None;
                for network in &diff.to_create {
                    if let Err(error) = self.associate(&service, network, cache).await {
                        warn!(%name, %network, %error, "Failed to associate service");
                        last_error = Some(error);
                    }
                }
                if let Some(error) = last_error {
                    return Err(error);
                }
                service
            }
        };

        Ok(ServiceStatus {
            arn: service.arn,
            id: service.id,
            dns_name: service.dns_name,
            remote_status: service.status,
        })
    }

    /// Deletes the service and the associations this controller owns.
    ///
    /// The service itself is deleted only once no owned association remains.
    pub async fn delete(&self, spec: &ServiceSpec) -> Result<()> {
        let name = spec.lattice_name();
        let service = match self.api.find_service(&name).await? {
            Some(service) => service,
            None => return Ok(()),
        };
        if !is_arn_managed(&*self.api, &self.cloud, &service.arn).await? {
            info!(%name, "Service is not managed by this controller");
            return Ok(());
        }

        let mut pending = 0;
        for association in self.api.list_service_associations(&service.id).await? {
            if !is_arn_managed(&*self.api, &self.cloud, &association.arn).await? {
                continue;
            }
            pending += 1;
            if association.status == ResourceStatus::DeleteInProgress {
                continue;
            }
            info!(%name, network = %association.service_network_name, "Disassociating service");
            match self.api.delete_service_association(&association.id).await {
                Ok(()) | Err(ApiError::NotFound(_)) => {}
                Err(error) => return Err(error.into()),
            }
        }
        if pending > 0 {
            return Err(Error::retry(format!(
                "waiting for {pending} association(s) of service {name} to be deleted"
            )));
        }

        info!(%name, "Deleting service");
        match self.api.delete_service(&service.id).await {
            Ok(()) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    /// Verifies the service is managed by this controller, adopting it if it carries no
    /// owner tag at all.
    async fn ensure_owned(&self, service: &ServiceSummary, spec: &ServiceSpec) -> Result<()> {
        let tags = self.api.list_tags(&service.arn).await?;
        match tags.get(MANAGED_BY) {
            Some(owner) if *owner == self.cloud.managed_by() => Ok(()),
            Some(owner) => Err(Error::conflict(format!(
                "service {} is managed by {owner}",
                service.name
            ))),
            None => {
                info!(name = %service.name, "Tagging untagged service");
                self.api
                    .tag_resource(
                        &service.arn,
                        self.cloud.merge_default_tags(spec.provenance_tags()),
                    )
                    .await?;
                Ok(())
            }
        }
    }

    async fn reconcile_associations(
        &self,
        service: &ServiceSummary,
        desired: &[String],
        cache: &ReconciliationCache,
    ) -> Result<()> {
        let current = self.api.list_service_associations(&service.id).await?;

        if let Some(deleting) = current.iter().find(|a| {
            a.status == ResourceStatus::DeleteInProgress
                && desired.contains(&a.service_network_name)
        }) {
            return Err(Error::retry(format!(
                "association of service {} with {} is being deleted",
                service.name, deleting.service_network_name
            )));
        }

        let diff = AssociationDiff::new(
            desired.iter().map(String::as_str),
            current.iter().map(|a| a.service_network_name.as_str()),
        );

        let mut last_error = None;
        for network in &diff.to_create {
            if let Err(error) = self.associate(service, network, cache).await {
                warn!(name = %service.name, %network, %error, "Failed to associate service");
                last_error = Some(error);
            }
        }

        for association in current
            .iter()
            .filter(|a| diff.to_delete.contains(&a.service_network_name))
        {
            if association.status == ResourceStatus::DeleteInProgress {
                continue;
            }
            if !is_arn_managed(&*self.api, &self.cloud, &association.arn).await? {
                info!(
                    name = %service.name,
                    network = %association.service_network_name,
                    "Leaving association not managed by this controller"
                );
                continue;
            }
            info!(
                name = %service.name,
                network = %association.service_network_name,
                "Disassociating service"
            );
            match self.api.delete_service_association(&association.id).await {
                Ok(()) | Err(ApiError::NotFound(_)) => {}
                Err(error) => {
                    warn!(name = %service.name, %error, "Failed to disassociate service");
                    last_error = Some(error.into());
                }
            }
        }

        match last_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn associate(
        &self,
        service: &ServiceSummary,
        network_name: &str,
        cache: &ReconciliationCache,
    ) -> Result<()> {
        let network = match cache.service_network(network_name) {
            Some(network) => network,
            None => {
                let network = self
                    .api
                    .find_service_network(network_name)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("service network {network_name}")))?;
                let network = RemoteRef {
                    arn: network.arn,
                    id: network.id,
                    name: network.name,
                };
                cache.put_service_network(network_name, network.clone());
                network
            }
        };

        info!(name = %service.name, network = %network_name, "Associating service");
        let output = self
            .api
            .create_service_association(CreateServiceAssociationRequest {
                service_id: service.id.clone(),
                service_network_id: network.id,
                tags: self.cloud.default_tags(),
            })
            .await?;
        if output.status.is_failed() {
            return Err(Error::retry(format!(
                "association of service {} with {network_name} is {}",
                service.name, output.status
            )));
        }
        Ok(())
    }
}

// === impl AssociationDiff ===

impl AssociationDiff {
    pub fn new<'a>(
        desired: impl IntoIterator<Item = &'a str>,
        current: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let desired = desired.into_iter().collect::<BTreeSet<_>>();
        let current = current.into_iter().collect::<BTreeSet<_>>();
        Self {
            to_create: desired.difference(&current).map(|n| n.to_string()).collect(),
            to_delete: current.difference(&desired).map(|n| n.to_string()).collect(),
        }
    }
}
