//! Per-kind orchestration of remote API calls.
//!
//! Managers reconcile a single resource at a time. Every mutation of a resource that already
//! exists remotely is gated on the ownership protocol in [`lattice_controller_core::tags`], and
//! only an `Active` remote status is reported as success.

mod access_log;
mod listener;
mod rule;
mod service;
mod service_network;
mod target_group;
mod targets;

pub use self::{
    access_log::AccessLogSubscriptionManager,
    listener::ListenerManager,
    rule::{is_equivalent_match, PrioritySlots, RuleManager},
    service::{AssociationDiff, ServiceManager},
    service_network::ServiceNetworkManager,
    target_group::{ManagedTargetGroup, TargetGroupManager},
    targets::TargetsManager,
};

use lattice_controller_core::{Error, ResourceStatus, Result};
use std::fmt;

/// Surfaces any status other than `Active` as a retry.
pub(crate) fn require_active(status: ResourceStatus, what: impl fmt::Display) -> Result<()> {
    if status == ResourceStatus::Active {
        return Ok(());
    }
    Err(Error::retry(format!("{what} is {status}")))
}
