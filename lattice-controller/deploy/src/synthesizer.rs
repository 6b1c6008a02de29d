//! Drives the managers across every resource of one kind in a stack.
//!
//! A synthesizer keeps going when a single resource fails so that one bad resource does not
//! starve its siblings, and reports the last failure once every resource has been attempted.
//! Other failures are reported as an [`Error::Retry`] caused by the last of them; errors that
//! retrying cannot resolve are reported as-is.

mod access_log;
mod listener;
mod rule;
mod service;
mod service_network;
mod target_group;
mod targets;

pub use self::{
    access_log::AccessLogSubscriptionSynthesizer, listener::ListenerSynthesizer,
    rule::RuleSynthesizer, service::ServiceSynthesizer,
    service_network::ServiceNetworkSynthesizer, target_group::TargetGroupSynthesizer,
    targets::TargetsSynthesizer,
};

use crate::{manager::TargetGroupManager, ReconciliationCache};
use async_trait::async_trait;
use lattice_controller_core::{
    api::{RuleAction, WeightedTargetGroup},
    model::{RuleTargetGroup, TargetGroupRef},
    Error, ResourceKind, Result, Stack,
};
use tracing::warn;

#[async_trait]
pub trait Synthesize: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Creates and updates the stack's resources of this kind, recording their remote status
    /// in the stack.
    async fn synthesize(&self, stack: &mut Stack, cache: &ReconciliationCache) -> Result<()>;

    /// Deletes resources marked for deletion and garbage-collects orphans. Runs after every
    /// kind has been synthesized, in reverse dependency order.
    async fn post_synthesize(
        &self,
        _stack: &mut Stack,
        _cache: &ReconciliationCache,
    ) -> Result<()> {
        Ok(())
    }
}

/// Accumulates per-resource failures within a synthesizer.
///
/// The first terminal error is reported as-is. Otherwise the last error is reported as the cause
/// of a retry.
#[derive(Debug)]
pub(crate) struct Failures {
    kind: ResourceKind,
    count: usize,
    terminal: Option<Error>,
    last: Option<Error>,
}

impl Failures {
    pub(crate) fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            count: 0,
            terminal: None,
            last: None,
        }
    }

    pub(crate) fn record(&mut self, id: &str, error: Error) {
        warn!(kind = %self.kind, %id, %error, "Failed to synthesize resource");
        self.count += 1;
        if error.is_terminal() && self.terminal.is_none() {
            self.terminal = Some(error);
        } else {
            self.last = Some(error);
        }
    }

    pub(crate) fn finish(self) -> Result<()> {
        if let Some(error) = self.terminal {
            return Err(error);
        }
        match self.last {
            None => Ok(()),
            Some(error) => Err(Error::retry_caused_by(
                format!("{} {} resource(s) failed: {error}", self.count, self.kind),
                error,
            )),
        }
    }
}

/// Resolves a rule's target group references to remote target group IDs.
///
/// References that cannot be resolved are dropped; if none remain the action returns a
/// fixed 500 response. A reference to a stack target group that has not been synthesized yet
/// is an error, so that the rule is left untouched until it has been.
pub(crate) async fn resolve_action(
    targets: &[RuleTargetGroup],
    cache: &ReconciliationCache,
    target_groups: &TargetGroupManager,
) -> Result<RuleAction> {
    let mut forward = Vec::with_capacity(targets.len());
    for tg in targets {
        let target_group_id = match &tg.target {
            TargetGroupRef::Stack(id) => cache.target_group(id)?.id,
            TargetGroupRef::Remote(id) => id.clone(),
            TargetGroupRef::ServiceImport {
                name,
                namespace,
                cluster_name,
                vpc_id,
            } => {
                let exported = target_groups
                    .find_exported(name, namespace, cluster_name.as_deref(), vpc_id.as_deref())
                    .await?;
                match exported {
                    Some(exported) => exported.id,
                    None => {
                        warn!(%name, %namespace, "No exported target group for service import");
                        continue;
                    }
                }
            }
            TargetGroupRef::Invalid => continue,
        };
        forward.push(WeightedTargetGroup {
            target_group_id,
            weight: tg.weight,
        });
    }

    if forward.is_empty() {
        return Ok(RuleAction::INTERNAL_ERROR);
    }
    Ok(RuleAction::Forward(forward))
}
