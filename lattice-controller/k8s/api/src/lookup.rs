use crate::route;
use async_trait::async_trait;
use kube::api::{Api, DynamicObject};
use lattice_controller_core::{
    lookup::{RouteBackends, RouteKind},
    KubernetesLookup,
};
use tracing::debug;

/// Looks up routes and ServiceExports through the Kubernetes API.
#[derive(Clone)]
pub struct KubeLookup {
    client: kube::Client,
}

impl KubeLookup {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KubernetesLookup for KubeLookup {
    async fn route(
        &self,
        kind: RouteKind,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<RouteBackends>> {
        let api = Api::<DynamicObject>::namespaced_with(
            self.client.clone(),
            namespace,
            &route::route_resource(kind),
        );
        match api.get_opt(name).await? {
            Some(obj) => route::backends(&obj).map(Some),
            None => {
                debug!(?kind, %namespace, %name, "Route not found");
                Ok(None)
            }
        }
    }

    async fn service_export_exists(&self, namespace: &str, name: &str) -> anyhow::Result<bool> {
        let api = Api::<DynamicObject>::namespaced_with(
            self.client.clone(),
            namespace,
            &route::service_export_resource(),
        );
        let export = api.get_opt(name).await?;
        Ok(export.map_or(false, |export| export.metadata.deletion_timestamp.is_none()))
    }
}
