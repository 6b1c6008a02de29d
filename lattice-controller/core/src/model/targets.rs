use super::{ResourceKind, ResourceMeta};
use crate::api::Target;

/// The complete desired registration set for one target group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Targets {
    pub meta: ResourceMeta,
    pub spec: TargetsSpec,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetsSpec {
    pub stack_target_group_id: String,
    pub targets: Vec<Target>,
}

impl Targets {
    pub fn new(id: impl Into<String>, spec: TargetsSpec) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::Targets, id),
            spec,
        }
    }
}
