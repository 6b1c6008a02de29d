//! The ownership and tagging protocol.
//!
//! Every resource the controller creates carries a `ManagedBy` tag whose value identifies the
//! controller instance (see [`CloudConfig::managed_by`]). A pre-existing remote resource is
//! mutated or deleted only when its tags carry that exact value. Ownership is always read from
//! the remote system; it is never cached across passes.
//!
//! Target groups and services additionally carry provenance tags naming the Kubernetes objects
//! they were derived from, which garbage collection uses to find their originators.

use crate::{
    api::{NetworkingApi, Tags},
    config::CloudConfig,
    error::{Error, Result},
};
use std::{fmt, str::FromStr};

pub const TAG_PREFIX: &str = "application-networking.k8s.aws/";

pub const MANAGED_BY: &str = "application-networking.k8s.aws/ManagedBy";
pub const K8S_CLUSTER_NAME: &str = "application-networking.k8s.aws/K8SClusterName";
pub const K8S_SERVICE_NAME: &str = "application-networking.k8s.aws/K8SServiceName";
pub const K8S_SERVICE_NAMESPACE: &str = "application-networking.k8s.aws/K8SServiceNamespace";
pub const K8S_ROUTE_NAME: &str = "application-networking.k8s.aws/K8SRouteName";
pub const K8S_ROUTE_NAMESPACE: &str = "application-networking.k8s.aws/K8SRouteNamespace";
pub const K8S_SOURCE_TYPE: &str = "application-networking.k8s.aws/K8SSourceType";

/// Whether a remote resource lives in the controller's own account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ownership {
    Local,
    /// Visible through resource sharing from another account. Read-only to this controller.
    Shared { owner_account: String },
}

/// The Kubernetes object kind a target group was synthesized from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetGroupSource {
    HttpRoute,
    GrpcRoute,
    TlsRoute,
    ServiceExport,
}

/// Provenance tags carried by controller-created target groups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetGroupTagFields {
    pub source: Option<TargetGroupSource>,
    pub cluster_name: Option<String>,
    pub service_name: Option<String>,
    pub service_namespace: Option<String>,
    pub route_name: Option<String>,
    pub route_namespace: Option<String>,
}

/// Classifies a resource by the account segment of its ARN.
///
/// ARNs have the form `arn:<partition>:<service>:<region>:<account>:<resource>`. This is the
/// only place that parses that format.
pub fn classify_arn(arn: &str, account_id: &str) -> Result<Ownership> {
    let owner = arn_account(arn).ok_or_else(|| Error::Invalid(format!("malformed ARN {arn:?}")))?;
    if owner == account_id {
        Ok(Ownership::Local)
    } else {
        Ok(Ownership::Shared {
            owner_account: owner.to_string(),
        })
    }
}

fn arn_account(arn: &str) -> Option<&str> {
    let mut parts = arn.splitn(6, ':');
    if parts.next()? != "arn" {
        return None;
    }
    let account = parts.nth(3)?;
    // The resource segment must be present.
    parts.next()?;
    if account.is_empty() {
        return None;
    }
    Some(account)
}

/// Fetches the resource's current tags and reports whether this controller manages it.
pub async fn is_arn_managed(
    api: &dyn NetworkingApi,
    cloud: &CloudConfig,
    arn: &str,
) -> Result<bool> {
    let tags = api.list_tags(arn).await?;
    Ok(cloud.is_managed(&tags))
}

// === impl CloudConfig ===

impl CloudConfig {
    /// Tags written to every resource this controller creates.
    pub fn default_tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert(MANAGED_BY.to_string(), self.managed_by());
        tags
    }

    /// Merges additional tags over the defaults. The `ManagedBy` tag cannot be overridden.
    pub fn merge_default_tags(&self, additional: Tags) -> Tags {
        let mut tags = additional;
        tags.extend(self.default_tags());
        tags
    }

    pub fn is_managed(&self, tags: &Tags) -> bool {
        tags.get(MANAGED_BY)
            .map(|v| *v == self.managed_by())
            .unwrap_or(false)
    }

    pub fn ownership(&self, arn: &str) -> Result<Ownership> {
        classify_arn(arn, &self.account_id)
    }
}

// === impl TargetGroupSource ===

impl TargetGroupSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HttpRoute => "HTTPRoute",
            Self::GrpcRoute => "GRPCRoute",
            Self::TlsRoute => "TLSRoute",
            Self::ServiceExport => "ServiceExport",
        }
    }

    pub fn is_route(self) -> bool {
        !matches!(self, Self::ServiceExport)
    }
}

impl fmt::Display for TargetGroupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetGroupSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HTTPRoute" => Ok(Self::HttpRoute),
            "GRPCRoute" => Ok(Self::GrpcRoute),
            "TLSRoute" => Ok(Self::TlsRoute),
            "ServiceExport" => Ok(Self::ServiceExport),
            _ => Err(Error::UnsupportedKind(s.to_string())),
        }
    }
}

// === impl TargetGroupTagFields ===

impl TargetGroupTagFields {
    pub fn to_tags(&self) -> Tags {
        let mut tags = Tags::new();
        let mut put = |key: &str, value: Option<&str>| {
            if let Some(value) = value {
                tags.insert(key.to_string(), value.to_string());
            }
        };
        put(K8S_SOURCE_TYPE, self.source.map(TargetGroupSource::as_str));
        put(K8S_CLUSTER_NAME, self.cluster_name.as_deref());
        put(K8S_SERVICE_NAME, self.service_name.as_deref());
        put(K8S_SERVICE_NAMESPACE, self.service_namespace.as_deref());
        put(K8S_ROUTE_NAME, self.route_name.as_deref());
        put(K8S_ROUTE_NAMESPACE, self.route_namespace.as_deref());
        tags
    }

    /// Reads provenance from remote tags. An unrecognized source type is treated as absent.
    pub fn from_tags(tags: &Tags) -> Self {
        let get = |key: &str| tags.get(key).cloned();
        Self {
            source: tags.get(K8S_SOURCE_TYPE).and_then(|s| s.parse().ok()),
            cluster_name: get(K8S_CLUSTER_NAME),
            service_name: get(K8S_SERVICE_NAME),
            service_namespace: get(K8S_SERVICE_NAMESPACE),
            route_name: get(K8S_ROUTE_NAME),
            route_namespace: get(K8S_ROUTE_NAMESPACE),
        }
    }

    /// True when the tags name a backend service and a supported source kind.
    pub fn has_provenance(&self) -> bool {
        self.source.is_some() && self.service_name.is_some() && self.service_namespace.is_some()
    }
}
