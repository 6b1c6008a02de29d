use super::{ResourceKind, ResourceMeta};
use crate::{
    api::{ResourceStatus, Tags},
    lookup::RouteKind,
    tags::{K8S_ROUTE_NAME, K8S_ROUTE_NAMESPACE},
};

/// The remote system limits service names to this many characters.
const MAX_SERVICE_NAME_LEN: usize = 40;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    pub meta: ResourceMeta,
    pub spec: ServiceSpec,
    pub status: Option<ServiceStatus>,
}

/// Names the route a service was derived from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RouteId {
    pub name: String,
    pub namespace: String,
    pub kind: RouteKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceSpec {
    pub route: RouteId,
    pub custom_domain_name: Option<String>,
    pub certificate_arn: Option<String>,

    /// Names of the service networks the service should be associated with.
    pub service_network_names: Vec<String>,

    pub is_deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceStatus {
    pub arn: String,
    pub id: String,
    pub dns_name: Option<String>,
    pub remote_status: ResourceStatus,
}

/// Derives the remote service name for a route: `<name>-<namespace>`, truncated to the remote
/// length limit.
pub fn service_name(route_name: &str, route_namespace: &str) -> String {
    let mut name = format!("{route_name}-{route_namespace}").to_lowercase();
    name.truncate(MAX_SERVICE_NAME_LEN);
    name.trim_end_matches('-').to_string()
}

impl Service {
    pub fn new(id: impl Into<String>, spec: ServiceSpec) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::Service, id),
            spec,
            status: None,
        }
    }
}

impl ServiceSpec {
    pub fn lattice_name(&self) -> String {
        service_name(&self.route.name, &self.route.namespace)
    }

    /// Provenance tags written on creation, in addition to the controller's defaults.
    pub fn provenance_tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert(K8S_ROUTE_NAME.to_string(), self.route.name.clone());
        tags.insert(K8S_ROUTE_NAMESPACE.to_string(), self.route.namespace.clone());
        tags
    }
}
