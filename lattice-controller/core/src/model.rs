//! The desired-state model.
//!
//! A [`Stack`] holds every resource derived from one Kubernetes object for one reconciliation
//! pass. Resources reference one another by their stack-scoped IDs; remote identifiers are only
//! known once the referenced resource has been synthesized, and are written back into each
//! resource's `status`.

mod access_log;
mod listener;
mod rule;
mod service;
mod service_network;
mod stack;
mod target_group;
mod targets;

pub use self::{
    access_log::{
        AccessLogSource, AccessLogSubscription, AccessLogSubscriptionSpec,
        AccessLogSubscriptionStatus,
    },
    listener::{DefaultAction, Listener, ListenerSpec, ListenerStatus},
    rule::{
        Rule, RuleSpec, RuleStatus, RuleTargetGroup, TargetGroupRef, MAX_RULE_PRIORITY,
        MIN_RULE_PRIORITY,
    },
    service::{service_name, RouteId, Service, ServiceSpec, ServiceStatus},
    service_network::{ServiceNetwork, ServiceNetworkSpec, ServiceNetworkStatus},
    stack::{Resource, Stack, StackId, StackResource},
    target_group::{TargetGroup, TargetGroupSpec, TargetGroupStatus},
    targets::{Targets, TargetsSpec},
};
use crate::error::Error;
use std::{fmt, str::FromStr};

/// The closed set of resource kinds the engine synthesizes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    ServiceNetwork,
    Service,
    Listener,
    Rule,
    TargetGroup,
    Targets,
    AccessLogSubscription,
}

/// Identifies a resource within its stack.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceMeta {
    pub kind: ResourceKind,
    pub id: String,
}

// === impl ResourceKind ===

impl ResourceKind {
    pub const ALL: [Self; 7] = [
        Self::ServiceNetwork,
        Self::Service,
        Self::Listener,
        Self::Rule,
        Self::TargetGroup,
        Self::Targets,
        Self::AccessLogSubscription,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServiceNetwork => "AWS::VPCServiceNetwork::ServiceNetwork",
            Self::Service => "AWS::VPCServiceNetwork::Service",
            Self::Listener => "AWS::VPCServiceNetwork::Listener",
            Self::Rule => "AWS::VPCServiceNetwork::Rule",
            Self::TargetGroup => "AWS::VPCServiceNetwork::TargetGroup",
            Self::Targets => "AWS::VPCServiceNetwork::Targets",
            Self::AccessLogSubscription => "AWS::VPCServiceNetwork::AccessLogSubscription",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnsupportedKind(s.to_string()))
    }
}

// === impl ResourceMeta ===

impl ResourceMeta {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_a_typed_error() {
        match "AWS::VPCServiceNetwork::AuthPolicy".parse::<ResourceKind>() {
            Err(Error::UnsupportedKind(kind)) => {
                assert_eq!(kind, "AWS::VPCServiceNetwork::AuthPolicy")
            }
            res => panic!("unexpected result: {res:?}"),
        }
    }
}
