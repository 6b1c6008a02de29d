use super::{ResourceKind, ResourceMeta};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceNetwork {
    pub meta: ResourceMeta,
    pub spec: ServiceNetworkSpec,
    pub status: Option<ServiceNetworkStatus>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceNetworkSpec {
    pub name: String,

    /// The account expected to own the network. `None` means the controller's own account.
    pub account: Option<String>,

    /// Whether the controller's VPC should be associated with the network.
    pub associate_to_vpc: bool,
    pub security_group_ids: Vec<String>,

    pub is_deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceNetworkStatus {
    pub arn: String,
    pub id: String,
    pub vpc_association_arn: Option<String>,
}

impl ServiceNetwork {
    pub fn new(id: impl Into<String>, spec: ServiceNetworkSpec) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::ServiceNetwork, id),
            spec,
            status: None,
        }
    }
}
