use super::{ResourceKind, ResourceMeta};
use crate::{
    api::HttpMatch,
    error::{Error, Result},
};

/// Priority slots available to non-default rules. The remote system reserves the slots outside
/// this range for the listener's default action.
pub const MIN_RULE_PRIORITY: u32 = 1;
pub const MAX_RULE_PRIORITY: u32 = 99;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub meta: ResourceMeta,
    pub spec: RuleSpec,
    pub status: Option<RuleStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSpec {
    pub stack_service_id: String,
    pub stack_listener_id: String,

    /// Encodes the desired priority as `rule-<n>`.
    pub rule_id: String,

    pub matcher: HttpMatch,
    pub targets: Vec<RuleTargetGroup>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleTargetGroup {
    pub target: TargetGroupRef,
    pub weight: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetGroupRef {
    /// A target group synthesized from the same stack.
    Stack(String),

    /// A target group exported from another cluster, found by its provenance tags.
    ServiceImport {
        name: String,
        namespace: String,
        cluster_name: Option<String>,
        vpc_id: Option<String>,
    },

    /// An already-known remote target group ID.
    Remote(String),

    /// A backend reference the builder could not resolve.
    Invalid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleStatus {
    pub arn: String,
    pub id: String,
    pub name: String,

    /// The priority the rule currently occupies remotely.
    pub priority: u32,

    /// Set when the remote priority differs from the one encoded in the rule ID.
    pub priority_update_needed: bool,
}

impl Rule {
    pub fn new(id: impl Into<String>, spec: RuleSpec) -> Self {
        Self {
            meta: ResourceMeta::new(ResourceKind::Rule, id),
            spec,
            status: None,
        }
    }
}

impl RuleSpec {
    /// Parses the desired priority out of the rule ID.
    pub fn priority(&self) -> Result<u32> {
        let invalid = || Error::InvalidRuleId(self.rule_id.clone());
        let n = self
            .rule_id
            .strip_prefix("rule-")
            .ok_or_else(invalid)?
            .parse::<u32>()
            .map_err(|_| invalid())?;
        if !(MIN_RULE_PRIORITY..=MAX_RULE_PRIORITY).contains(&n) {
            return Err(invalid());
        }
        Ok(n)
    }
}
