//! Collaborators the synthesis engine consults but does not implement.

use async_trait::async_trait;

/// A route kind whose backends may own target groups.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Http,
    Grpc,
    Tls,
}

/// A route's backend reference, with the namespace left as written in the route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendRef {
    pub name: String,
    pub namespace: Option<String>,
    /// `None` means the core `Service` kind.
    pub kind: Option<String>,
    pub port: Option<u16>,
}

/// The parts of a route that target-group garbage collection inspects.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteBackends {
    /// Set when the route carries a deletion timestamp.
    pub deleting: bool,
    pub backends: Vec<BackendRef>,
}

/// Looks up the Kubernetes objects that target groups are derived from.
#[async_trait]
pub trait KubernetesLookup: Send + Sync {
    async fn route(
        &self,
        kind: RouteKind,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<RouteBackends>>;

    /// Returns `true` if the ServiceExport exists and is not being deleted.
    async fn service_export_exists(&self, namespace: &str, name: &str) -> anyhow::Result<bool>;
}

/// Publishes a DNS endpoint mapping a customer domain onto a service's assigned domain.
#[async_trait]
pub trait DnsEndpointPublisher: Send + Sync {
    async fn publish(&self, custom_domain: &str, service_domain: &str) -> anyhow::Result<()>;
}

/// A publisher for controllers that do not manage DNS.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoDns;

#[async_trait]
impl DnsEndpointPublisher for NoDns {
    async fn publish(&self, custom_domain: &str, service_domain: &str) -> anyhow::Result<()> {
        tracing::debug!(%custom_domain, %service_domain, "DNS publication disabled");
        Ok(())
    }
}

// === impl BackendRef ===

impl BackendRef {
    /// Whether this reference points at the given core Service, defaulting the namespace to the
    /// route's.
    pub fn targets_service(&self, route_namespace: &str, name: &str, namespace: &str) -> bool {
        let is_service = match self.kind.as_deref() {
            None | Some("Service") => true,
            Some(_) => false,
        };
        is_service
            && self.name == name
            && self.namespace.as_deref().unwrap_or(route_namespace) == namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_namespace_defaults_to_route() {
        let backend = BackendRef {
            name: "svc".to_string(),
            namespace: None,
            kind: None,
            port: Some(80),
        };
        assert!(backend.targets_service("ns", "svc", "ns"));
        assert!(!backend.targets_service("other", "svc", "ns"));

        let explicit = BackendRef {
            namespace: Some("ns".to_string()),
            ..backend.clone()
        };
        assert!(explicit.targets_service("other", "svc", "ns"));

        let import = BackendRef {
            kind: Some("ServiceImport".to_string()),
            ..backend
        };
        assert!(!import.targets_service("ns", "svc", "ns"));
    }
}
