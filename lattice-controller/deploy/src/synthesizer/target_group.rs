use super::{Failures, Synthesize};
use crate::{
    manager::{ManagedTargetGroup, TargetGroupManager},
    ReconciliationCache, RemoteRef,
};
use async_trait::async_trait;
use lattice_controller_core::{
    lookup::RouteKind,
    model::TargetGroup,
    tags::{TargetGroupSource, TargetGroupTagFields},
    Error, KubernetesLookup, ResourceKind, Result, Stack,
};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info};

/// Synthesizes target groups and garbage-collects the ones no Kubernetes object uses anymore.
pub struct TargetGroupSynthesizer {
    manager: TargetGroupManager,
    k8s: Arc<dyn KubernetesLookup>,
}

impl TargetGroupSynthesizer {
    pub fn new(manager: TargetGroupManager, k8s: Arc<dyn KubernetesLookup>) -> Self {
        Self { manager, k8s }
    }

    /// Deletes managed target groups whose originating object is gone or no longer refers to
    /// them. Target groups synthesized in this pass are never collected.
    async fn collect_unused(&self, stack: &Stack, failures: &mut Failures) -> Result<()> {
        let desired = stack
            .list::<TargetGroup>()
            .filter_map(|tg| tg.status.as_ref())
            .map(|status| status.arn.as_str())
            .collect::<HashSet<_>>();

        for tg in self.manager.list().await? {
            if desired.contains(tg.summary.arn.as_str()) {
                continue;
            }
            match self.is_in_use(&tg).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(error) => {
                    failures.record(&tg.summary.name, error);
                    continue;
                }
            }

            info!(name = %tg.summary.name, "Deleting unused target group");
            match self.manager.delete(&tg.summary).await {
                Ok(()) => {}
                Err(error) if is_still_referenced(&error) => {
                    debug!(name = %tg.summary.name, %error, "Target group is still referenced");
                }
                Err(error) => failures.record(&tg.summary.name, error),
            }
        }
        Ok(())
    }

    async fn is_in_use(&self, tg: &ManagedTargetGroup) -> Result<bool> {
        let tags = &tg.provenance;
        let (Some(source), Some(service_name), Some(service_namespace)) = (
            tags.source,
            tags.service_name.as_deref(),
            tags.service_namespace.as_deref(),
        ) else {
            return Ok(false);
        };

        let route_kind = match source {
            TargetGroupSource::ServiceExport => {
                return self
                    .k8s
                    .service_export_exists(service_namespace, service_name)
                    .await
                    .map_err(Error::Kubernetes);
            }
            TargetGroupSource::HttpRoute => RouteKind::Http,
            TargetGroupSource::GrpcRoute => RouteKind::Grpc,
            TargetGroupSource::TlsRoute => RouteKind::Tls,
        };
        let (Some(route_name), Some(route_namespace)) =
            (tags.route_name.as_deref(), tags.route_namespace.as_deref())
        else {
            return Ok(false);
        };

        let route = match self
            .k8s
            .route(route_kind, route_namespace, route_name)
            .await
            .map_err(Error::Kubernetes)?
        {
            Some(route) if !route.deleting => route,
            _ => return Ok(false),
        };

        Ok(route.backends.iter().any(|backend| {
            if !backend.targets_service(route_namespace, service_name, service_namespace) {
                return false;
            }
            let expected = TargetGroupTagFields {
                source: Some(source),
                cluster_name: None,
                service_name: Some(backend.name.clone()),
                service_namespace: Some(
                    backend
                        .namespace
                        .clone()
                        .unwrap_or_else(|| route_namespace.to_string()),
                ),
                route_name: Some(route_name.to_string()),
                route_namespace: Some(route_namespace.to_string()),
            };
            self.manager.is_target_group_match(&expected, tg)
        }))
    }
}

#[async_trait]
impl Synthesize for TargetGroupSynthesizer {
    fn kind(&self) -> ResourceKind {
        ResourceKind::TargetGroup
    }

    async fn synthesize(&self, stack: &mut Stack, cache: &ReconciliationCache) -> Result<()> {
        let mut failures = Failures::new(self.kind());
        for id in stack.ids::<TargetGroup>() {
            let spec = stack.get::<TargetGroup>(&id)?.spec.clone();
            if spec.is_deleted {
                continue;
            }
            match self.manager.upsert(&spec).await {
                Ok(status) => {
                    cache.put_target_group(
                        &id,
                        RemoteRef {
                            arn: status.arn.clone(),
                            id: status.id.clone(),
                            name: status.name.clone(),
                        },
                    );
                    stack.get_mut::<TargetGroup>(&id)?.status = Some(status);
                }
                Err(error) => failures.record(&id, error),
            }
        }
        failures.finish()
    }

    async fn post_synthesize(&self, stack: &mut Stack, _cache: &ReconciliationCache) -> Result<()> {
        let mut failures = Failures::new(self.kind());
        for tg in stack.list::<TargetGroup>().filter(|tg| tg.spec.is_deleted) {
            if let Err(error) = self.manager.delete_spec(&tg.spec).await {
                failures.record(&tg.meta.id, error);
            }
        }
        if let Err(error) = self.collect_unused(stack, &mut failures).await {
            failures.record("unused target groups", error);
        }
        failures.finish()
    }
}

/// Deletion of a target group still used by a rule or listener fails with a conflict. Such
/// target groups are collected once the referencing rule is gone.
fn is_still_referenced(error: &Error) -> bool {
    matches!(error, Error::Conflict(msg) if msg.contains("referenced") || msg.contains("in use"))
}
