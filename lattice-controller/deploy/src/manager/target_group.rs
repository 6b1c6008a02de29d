use super::require_active;
use lattice_controller_core::{
    api::{
        ApiError, CreateTargetGroupRequest, ProtocolVersion, ResourceStatus, TargetGroupProtocol,
        TargetGroupSummary, TargetStatus,
    },
    model::{TargetGroupSpec, TargetGroupStatus},
    tags::{is_arn_managed, TargetGroupSource, TargetGroupTagFields},
    CloudConfig, Error, NetworkingApi, Result,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Manages target groups in the cluster's VPC.
#[derive(Clone)]
pub struct TargetGroupManager {
    api: Arc<dyn NetworkingApi>,
    cloud: Arc<CloudConfig>,
}

/// A remote target group carrying this controller's owner tag and provenance tags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagedTargetGroup {
    pub summary: TargetGroupSummary,
    pub provenance: TargetGroupTagFields,
}

impl TargetGroupManager {
    pub fn new(api: Arc<dyn NetworkingApi>, cloud: Arc<CloudConfig>) -> Self {
        Self { api, cloud }
    }

    /// Creates the target group if it does not exist, or reconciles its health check.
    ///
    /// A target group whose creation failed is treated as absent.
    pub async fn upsert(&self, spec: &TargetGroupSpec) -> Result<TargetGroupStatus> {
        let name = spec.name(self.cloud.long_target_group_names);
        let summary = match self.get(spec).await? {
            Some(existing) => {
                require_active(existing.status, format_args!("target group {name}"))?;
                if !is_arn_managed(&*self.api, &self.cloud, &existing.arn).await? {
                    return Err(Error::conflict(format!(
                        "target group {name} is not managed by this controller"
                    )));
                }
                if let Some(desired) = &spec.config.health_check {
                    let details = self.api.get_target_group(&existing.id).await?;
                    if details.health_check.as_ref() != Some(desired) {
                        info!(%name, "Updating target group health check");
                        self.api
                            .update_target_group_health_check(&existing.id, desired.clone())
                            .await?;
                    }
                }
                existing
            }
            None => {
                info!(%name, "Creating target group");
                let created = self
                    .api
                    .create_target_group(CreateTargetGroupRequest {
                        name: name.clone(),
                        config: spec.config.clone(),
                        tags: self.cloud.merge_default_tags(spec.provenance_tags()),
                    })
                    .await?;
                require_active(created.status, format_args!("target group {name}"))?;
                created
            }
        };

        Ok(TargetGroupStatus {
            arn: summary.arn,
            id: summary.id,
            name: summary.name,
        })
    }

    /// Finds the remote target group for `spec` in the cluster's VPC, preferring an active
    /// one. Target groups whose creation failed are ignored.
    pub async fn get(&self, spec: &TargetGroupSpec) -> Result<Option<TargetGroupSummary>> {
        let name = spec.name(self.cloud.long_target_group_names);
        Ok(self
            .api
            .list_target_groups(Some(&self.cloud.vpc_id))
            .await?
            .into_iter()
            .filter(|tg| tg.name == name && tg.status != ResourceStatus::CreateFailed)
            .min_by_key(|tg| tg.status != ResourceStatus::Active))
    }

    /// Deletes the target group named by `spec`, if it exists.
    pub async fn delete_spec(&self, spec: &TargetGroupSpec) -> Result<()> {
        let name = spec.name(self.cloud.long_target_group_names);
        let existing = self
            .api
            .list_target_groups(Some(&self.cloud.vpc_id))
            .await?
            .into_iter()
            .find(|tg| tg.name == name);
        match existing {
            Some(existing) => self.delete(&existing).await,
            None => Ok(()),
        }
    }

    /// Deregisters all targets and deletes the target group.
    ///
    /// Deletion is deferred while any target is in a state other than `Unused`. Target groups
    /// this controller does not manage are left untouched.
    pub async fn delete(&self, target_group: &TargetGroupSummary) -> Result<()> {
        let name = &target_group.name;
        if !is_arn_managed(&*self.api, &self.cloud, &target_group.arn).await? {
            info!(%name, "Target group is not managed by this controller");
            return Ok(());
        }
        if target_group.status.is_in_progress() {
            return Err(Error::retry(format!(
                "target group {name} is {}",
                target_group.status
            )));
        }

        let targets = self.api.list_targets(&target_group.id).await?;
        if let Some(busy) = targets.iter().find(|t| t.status != TargetStatus::Unused) {
            return Err(Error::retry(format!(
                "target {} of target group {name} is {:?}",
                busy.target, busy.status
            )));
        }
        if !targets.is_empty() {
            debug!(%name, targets = targets.len(), "Deregistering targets");
            let failures = self
                .api
                .deregister_targets(
                    &target_group.id,
                    targets.into_iter().map(|t| t.target).collect(),
                )
                .await?;
            if !failures.is_empty() {
                return Err(Error::retry(format!(
                    "failed to deregister {} target(s) from target group {name}",
                    failures.len()
                )));
            }
        }

        info!(%name, "Deleting target group");
        match self.api.delete_target_group(&target_group.id).await {
            Ok(()) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    /// Lists target groups in the cluster's VPC that this controller manages and that carry
    /// provenance tags.
    pub async fn list(&self) -> Result<Vec<ManagedTargetGroup>> {
        let mut managed = Vec::new();
        for summary in self
            .api
            .list_target_groups(Some(&self.cloud.vpc_id))
            .await?
        {
            let tags = self.api.list_tags(&summary.arn).await?;
            if !self.cloud.is_managed(&tags) {
                continue;
            }
            let provenance = TargetGroupTagFields::from_tags(&tags);
            if provenance.has_provenance() {
                managed.push(ManagedTargetGroup {
                    summary,
                    provenance,
                });
            }
        }
        Ok(managed)
    }

    /// Whether a remote target group still corresponds to the backend described by
    /// `expected`.
    ///
    /// Port is not part of a target group's identity.
    pub fn is_target_group_match(
        &self,
        expected: &TargetGroupTagFields,
        remote: &ManagedTargetGroup,
    ) -> bool {
        let Some(source) = expected.source else {
            return false;
        };
        let tags = &remote.provenance;
        let summary = &remote.summary;
        let same_route = !source.is_route()
            || (tags.route_name == expected.route_name
                && tags.route_namespace == expected.route_namespace);
        let compatible = match source {
            TargetGroupSource::GrpcRoute => summary.protocol_version == ProtocolVersion::Grpc,
            TargetGroupSource::HttpRoute => {
                summary.protocol != TargetGroupProtocol::Tcp
                    && summary.protocol_version != ProtocolVersion::Grpc
            }
            TargetGroupSource::TlsRoute => summary.protocol == TargetGroupProtocol::Tcp,
            TargetGroupSource::ServiceExport => true,
        };
        summary.vpc_id == self.cloud.vpc_id
            && tags.source == Some(source)
            && tags.service_name == expected.service_name
            && tags.service_namespace == expected.service_namespace
            && same_route
            && compatible
    }

    /// Finds the active target group another cluster exported for the named service.
    ///
    /// Exported target groups are owned by the exporting cluster, so ownership is not
    /// required.
    pub async fn find_exported(
        &self,
        name: &str,
        namespace: &str,
        cluster_name: Option<&str>,
        vpc_id: Option<&str>,
    ) -> Result<Option<TargetGroupSummary>> {
        for summary in self.api.list_target_groups(vpc_id).await? {
            if summary.status != ResourceStatus::Active {
                continue;
            }
            let tags = TargetGroupTagFields::from_tags(&self.api.list_tags(&summary.arn).await?);
            let matches = tags.source == Some(TargetGroupSource::ServiceExport)
                && tags.service_name.as_deref() == Some(name)
                && tags.service_namespace.as_deref() == Some(namespace)
                && cluster_name.map_or(true, |c| tags.cluster_name.as_deref() == Some(c));
            if matches {
                return Ok(Some(summary));
            }
        }
        Ok(None)
    }
}
