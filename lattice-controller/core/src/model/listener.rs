use super::{ResourceKind, ResourceMeta, RuleTargetGroup};
use crate::api::ListenerProtocol;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listener {
    pub meta: ResourceMeta,
    pub spec: ListenerSpec,
    pub status: Option<ListenerStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerSpec {
    pub stack_service_id: String,
    pub port: u16,
    pub protocol: ListenerProtocol,
    pub default_action: DefaultAction,
}

/// The action taken when no rule matches.
///
/// TLS-passthrough listeners cannot return fixed responses and forward to their backends
/// instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DefaultAction {
    FixedResponse { status_code: u16 },
    Forward(Vec<RuleTargetGroup>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerStatus {
    pub arn: String,
    pub id: String,
    pub name: String,
    pub service_id: String,
}

impl Listener {
    pub fn new(id: impl Into<String>, spec: ListenerSpec) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::Listener, id),
            spec,
            status: None,
        }
    }
}

impl Default for DefaultAction {
    fn default() -> Self {
        Self::FixedResponse { status_code: 404 }
    }
}
