use super::{ResourceKind, ResourceMeta};
use crate::api::Tags;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessLogSubscription {
    pub meta: ResourceMeta,
    pub spec: AccessLogSubscriptionSpec,
    pub status: Option<AccessLogSubscriptionStatus>,
}

/// The resource whose traffic is logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessLogSource {
    /// A service network, by name.
    ServiceNetwork(String),
    /// A service, by its remote name.
    Service(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessLogSubscriptionSpec {
    pub source: AccessLogSource,
    pub destination_arn: String,

    /// The ARN recorded by a previous pass, if any.
    pub existing_arn: Option<String>,

    /// Provenance tags naming the policy object that requested the subscription.
    pub tags: Tags,

    pub is_deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessLogSubscriptionStatus {
    pub arn: String,
    pub id: String,
}

impl AccessLogSubscription {
    pub fn new(id: impl Into<String>, spec: AccessLogSubscriptionSpec) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::AccessLogSubscription, id),
            spec,
            status: None,
        }
    }
}
