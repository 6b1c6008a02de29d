use super::{ResourceKind, ResourceMeta};
use crate::{
    api::{Tags, TargetGroupConfig},
    tags::{TargetGroupSource, TargetGroupTagFields},
};

const MAX_TARGET_GROUP_NAME_LEN: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetGroup {
    pub meta: ResourceMeta,
    pub spec: TargetGroupSpec,
    pub status: Option<TargetGroupStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetGroupSpec {
    pub config: TargetGroupConfig,
    pub provenance: TargetGroupTagFields,
    pub is_deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetGroupStatus {
    pub arn: String,
    pub id: String,
    pub name: String,
}

impl TargetGroup {
    pub fn new(id: impl Into<String>, spec: TargetGroupSpec) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::TargetGroup, id),
            spec,
            status: None,
        }
    }
}

impl TargetGroupSpec {
    /// Derives a deterministic remote name from the backend identity, protocol and protocol
    /// version, so that repeated passes find the same remote object.
    ///
    /// With `long_names`, route target groups also include the route name and VPC so that
    /// routes sharing a backend get distinct groups.
    pub fn name(&self, long_names: bool) -> String {
        let p = &self.provenance;
        let mut parts = vec![
            "k8s",
            p.service_name.as_deref().unwrap_or("unknown"),
            p.service_namespace.as_deref().unwrap_or("unknown"),
        ];
        match p.source {
            Some(TargetGroupSource::ServiceExport) => parts.push("export"),
            Some(_) if long_names => {
                parts.push(p.route_name.as_deref().unwrap_or("unknown"));
                parts.push(&self.config.vpc_id);
            }
            _ => {}
        }
        parts.push(self.config.protocol.as_str());
        parts.push(self.config.protocol_version.as_str());

        let mut name = parts
            .join("-")
            .chars()
            .map(|c| match c.to_ascii_lowercase() {
                c @ ('a'..='z' | '0'..='9' | '-') => c,
                _ => '-',
            })
            .collect::<String>();
        name.truncate(MAX_TARGET_GROUP_NAME_LEN);
        name.trim_end_matches('-').to_string()
    }

    pub fn provenance_tags(&self) -> Tags {
        self.provenance.to_tags()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{IpAddressType, ProtocolVersion, TargetGroupProtocol};

    fn spec(source: TargetGroupSource) -> TargetGroupSpec {
        TargetGroupSpec {
            config: TargetGroupConfig {
                port: 8080,
                protocol: TargetGroupProtocol::Http,
                protocol_version: ProtocolVersion::Http1,
                vpc_id: "vpc-0123".to_string(),
                ip_address_type: IpAddressType::Ipv4,
                health_check: None,
            },
            provenance: TargetGroupTagFields {
                source: Some(source),
                cluster_name: Some("cluster".to_string()),
                service_name: Some("Checkout".to_string()),
                service_namespace: Some("shop".to_string()),
                route_name: Some("r1".to_string()),
                route_namespace: Some("shop".to_string()),
            },
            is_deleted: false,
        }
    }

    #[test]
    fn names_are_deterministic() {
        let route = spec(TargetGroupSource::HttpRoute);
        assert_eq!(route.name(false), "k8s-checkout-shop-http-http1");
        assert_eq!(route.name(false), route.name(false));
        assert_eq!(route.name(true), "k8s-checkout-shop-r1-vpc-0123-http-http1");

        let export = spec(TargetGroupSource::ServiceExport);
        assert_eq!(export.name(false), "k8s-checkout-shop-export-http-http1");
        assert_eq!(export.name(true), "k8s-checkout-shop-export-http-http1");
    }

    #[test]
    fn names_are_sanitized_and_bounded() {
        let mut long = spec(TargetGroupSource::GrpcRoute);
        long.provenance.service_name = Some("svc.with_dots".repeat(20));
        let name = long.name(false);
        assert!(name.len() <= MAX_TARGET_GROUP_NAME_LEN);
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert!(!name.ends_with('-'));
    }
}
