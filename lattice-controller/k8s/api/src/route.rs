use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use lattice_controller_core::lookup::{BackendRef, RouteBackends, RouteKind};
use serde::Deserialize;

pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";
pub const MULTICLUSTER_GROUP: &str = "multicluster.x-k8s.io";

/// The fields shared by every route kind's `spec` that are needed to find its backends.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteSpec {
    #[serde(default)]
    rules: Vec<RouteRule>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteRule {
    #[serde(default)]
    backend_refs: Vec<BackendObjectReference>,
}

#[derive(Clone, Debug, Deserialize)]
struct BackendObjectReference {
    group: Option<String>,
    kind: Option<String>,
    name: String,
    namespace: Option<String>,
    port: Option<u16>,
}

pub fn route_resource(kind: RouteKind) -> ApiResource {
    let gvk = match kind {
        RouteKind::Http => GroupVersionKind::gvk(GATEWAY_API_GROUP, "v1", "HTTPRoute"),
        RouteKind::Grpc => GroupVersionKind::gvk(GATEWAY_API_GROUP, "v1", "GRPCRoute"),
        RouteKind::Tls => GroupVersionKind::gvk(GATEWAY_API_GROUP, "v1alpha2", "TLSRoute"),
    };
    ApiResource::from_gvk(&gvk)
}

pub fn service_export_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        MULTICLUSTER_GROUP,
        "v1alpha1",
        "ServiceExport",
    ))
}

/// Extracts the backend references of every rule of a route.
///
/// Backends in a group other than the core group keep their group in `kind`, so they are
/// never mistaken for a core `Service`.
pub fn backends(route: &DynamicObject) -> anyhow::Result<RouteBackends> {
    let spec = match route.data.get("spec") {
        Some(spec) => serde_json::from_value::<RouteSpec>(spec.clone())?,
        None => RouteSpec::default(),
    };

    let backends = spec
        .rules
        .into_iter()
        .flat_map(|rule| rule.backend_refs)
        .map(|backend| {
            let kind = match backend.group.as_deref() {
                None | Some("") | Some("core") => backend.kind,
                Some(group) => Some(format!(
                    "{}.{group}",
                    backend.kind.as_deref().unwrap_or("Service")
                )),
            };
            BackendRef {
                name: backend.name,
                namespace: backend.namespace,
                kind,
                port: backend.port,
            }
        })
        .collect();

    Ok(RouteBackends {
        deleting: route.metadata.deletion_timestamp.is_some(),
        backends,
    })
}
