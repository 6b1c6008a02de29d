use super::require_active;
use crate::{ReconciliationCache, RemoteRef};
use lattice_controller_core::{
    api::{
        ApiError, CreateServiceNetworkRequest, CreateVpcAssociationRequest, ServiceNetworkSummary,
        VpcAssociationSummary,
    },
    model::{ServiceNetworkSpec, ServiceNetworkStatus},
    tags::{is_arn_managed, Ownership},
    CloudConfig, Error, NetworkingApi, ResourceStatus, Result,
};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, info};

/// Manages service networks and the association of the cluster's VPC with them.
#[derive(Clone)]
pub struct ServiceNetworkManager {
    api: Arc<dyn NetworkingApi>,
    cloud: Arc<CloudConfig>,
}

impl ServiceNetworkManager {
    pub fn new(api: Arc<dyn NetworkingApi>, cloud: Arc<CloudConfig>) -> Self {
        Self { api, cloud }
    }

    /// Ensures the service network exists and its association with the cluster's VPC matches
    /// the desired state.
    ///
    /// A missing network is created unless `spec` names a foreign owning account, in which
    /// case the network must be shared with this account before it can be used.
    pub async fn create_or_update(
        &self,
        spec: &ServiceNetworkSpec,
        cache: &ReconciliationCache,
    ) -> Result<ServiceNetworkStatus> {
        let network = match self.api.find_service_network(&spec.name).await? {
            Some(network) => network,
            None => {
                if let Some(account) = spec
                    .account
                    .as_deref()
                    .filter(|account| *account != self.cloud.account_id)
                {
                    return Err(Error::not_found(format!(
                        "service network {} owned by account {account}",
                        spec.name
                    )));
                }
                info!(name = %spec.name, "Creating service network");
                self.api
                    .create_service_network(CreateServiceNetworkRequest {
                        name: spec.name.clone(),
                        tags: self.cloud.default_tags(),
                    })
                    .await?
            }
        };
        cache.put_service_network(
            &spec.name,
            RemoteRef {
                arn: network.arn.clone(),
                id: network.id.clone(),
                name: network.name.clone(),
            },
        );

        let vpc_association_arn = if spec.associate_to_vpc {
            Some(
                self.upsert_association(&network, &spec.security_group_ids)
                    .await?,
            )
        } else {
            self.delete_association(&network).await?;
            None
        };

        Ok(ServiceNetworkStatus {
            arn: network.arn,
            id: network.id,
            vpc_association_arn,
        })
    }

    /// Associates the cluster's VPC with the named service network, returning the
    /// association's ARN.
    ///
    /// Associations with networks shared from another account are never modified: if one
    /// exists it is returned as-is.
    pub async fn upsert_vpc_association(
        &self,
        network_name: &str,
        security_group_ids: &[String],
    ) -> Result<String> {
        let network = self.find(network_name).await?;
        self.upsert_association(&network, security_group_ids).await
    }

    /// Removes the association between the cluster's VPC and the named service network.
    ///
    /// Succeeds if the network or the association does not exist. Associations that are not
    /// managed by this controller are left in place.
    pub async fn delete_vpc_association(&self, network_name: &str) -> Result<()> {
        match self.api.find_service_network(network_name).await? {
            Some(network) => self.delete_association(&network).await,
            None => Ok(()),
        }
    }

    /// Deletes a service network that this controller created, once no VPCs remain associated
    /// with it.
    pub async fn delete(&self, network_name: &str) -> Result<()> {
        let network = match self.api.find_service_network(network_name).await? {
            Some(network) => network,
            None => return Ok(()),
        };
        if let Ownership::Shared { owner_account } = self.cloud.ownership(&network.arn)? {
            info!(name = %network_name, %owner_account, "Not deleting shared service network");
            return Ok(());
        }

        self.delete_association(&network).await?;

        if !is_arn_managed(&*self.api, &self.cloud, &network.arn).await? {
            info!(name = %network_name, "Service network is not managed by this controller");
            return Ok(());
        }
        let remaining = self.api.list_vpc_associations(&network.id).await?;
        if !remaining.is_empty() {
            info!(
                name = %network_name,
                associations = remaining.len(),
                "Service network is still associated with other VPCs"
            );
            return Ok(());
        }

        info!(name = %network_name, "Deleting service network");
        match self.api.delete_service_network(&network.id).await {
            Ok(()) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(ApiError::Conflict(reason)) => {
                info!(name = %network_name, %reason, "Service network is still in use");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn find(&self, name: &str) -> Result<ServiceNetworkSummary> {
        self.api
            .find_service_network(name)
            .await?
            .ok_or_else(|| Error::not_found(format!("service network {name}")))
    }

    /// Finds the association between the network and the cluster's VPC, preferring an active
    /// one.
    async fn vpc_association(&self, network_id: &str) -> Result<Option<VpcAssociationSummary>> {
        let mut associations = self
            .api
            .list_vpc_associations(network_id)
            .await?
            .into_iter()
            .filter(|a| a.vpc_id == self.cloud.vpc_id)
            .collect::<Vec<_>>();
        associations.sort_by_key(|a| a.status != ResourceStatus::Active);
        Ok(associations.into_iter().next())
    }

    async fn upsert_association(
        &self,
        network: &ServiceNetworkSummary,
        security_group_ids: &[String],
    ) -> Result<String> {
        let ownership = self.cloud.ownership(&network.arn)?;
        let existing = match self.vpc_association(&network.id).await? {
            Some(existing) => existing,
            None => return self.create_association(network, security_group_ids).await,
        };

        if let Ownership::Shared { owner_account } = ownership {
            debug!(
                network = %network.name,
                %owner_account,
                arn = %existing.arn,
                "Using existing association with shared service network"
            );
            return Ok(existing.arn);
        }

        if !is_arn_managed(&*self.api, &self.cloud, &existing.arn).await? {
            return Err(Error::conflict(format!(
                "VPC association {} with service network {} is not managed by this controller",
                existing.arn, network.name
            )));
        }
        require_active(
            existing.status,
            format_args!("VPC association with service network {}", network.name),
        )?;

        let details = self.api.get_vpc_association(&existing.id).await?;
        let current = details
            .security_group_ids
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>();
        let desired = security_group_ids
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>();
        if current == desired {
            return Ok(details.arn);
        }

        info!(
            network = %network.name,
            security_groups = ?security_group_ids,
            "Updating VPC association security groups"
        );
        let output = self
            .api
            .update_vpc_association(&existing.id, security_group_ids.to_vec())
            .await?;
        require_active(
            output.status,
            format_args!("VPC association with service network {}", network.name),
        )?;
        Ok(output.arn)
    }

    async fn create_association(
        &self,
        network: &ServiceNetworkSummary,
        security_group_ids: &[String],
    ) -> Result<String> {
        info!(
            network = %network.name,
            vpc = %self.cloud.vpc_id,
            "Associating VPC with service network"
        );
        let output = self
            .api
            .create_vpc_association(CreateVpcAssociationRequest {
                service_network_id: network.id.clone(),
                vpc_id: self.cloud.vpc_id.clone(),
                security_group_ids: security_group_ids.to_vec(),
                tags: self.cloud.default_tags(),
            })
            .await?;
        require_active(
            output.status,
            format_args!("VPC association with service network {}", network.name),
        )?;
        Ok(output.arn)
    }

    async fn delete_association(&self, network: &ServiceNetworkSummary) -> Result<()> {
        let existing = match self.vpc_association(&network.id).await? {
            Some(existing) => existing,
            None => return Ok(()),
        };
        if !is_arn_managed(&*self.api, &self.cloud, &existing.arn).await? {
            info!(
                network = %network.name,
                arn = %existing.arn,
                "VPC association is not managed by this controller"
            );
            return Ok(());
        }
        if existing.status.is_in_progress() {
            return Err(Error::retry(format!(
                "VPC association with service network {} is {}",
                network.name, existing.status
            )));
        }

        info!(network = %network.name, "Disassociating VPC from service network");
        let output = match self.api.delete_vpc_association(&existing.id).await {
            Ok(output) => output,
            Err(ApiError::NotFound(_)) => return Ok(()),
            Err(error) => return Err(error.into()),
        };
        if output.status.is_in_progress() || output.status.is_failed() {
            return Err(Error::retry(format!(
                "VPC association with service network {} is {}",
                network.name, output.status
            )));
        }
        Ok(())
    }
}
