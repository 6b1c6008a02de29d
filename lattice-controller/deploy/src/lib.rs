//! Converges a desired-state [`Stack`] onto the remote networking control plane.
//!
//! Each resource kind has a *manager*, which owns the remote API orchestration and status
//! handling for a single resource, and a *synthesizer*, which drives its manager across every
//! resource of that kind in a stack, deletes resources marked for removal and garbage-collects
//! orphans. The [`StackDeployer`] runs the synthesizers in dependency order:
//!
//! ```text
//! ServiceNetwork -> TargetGroup -> Targets -> Service -> Listener -> Rule -> AccessLogSubscription
//! ```
//!
//! and then runs their post-synthesis phases (deletions and garbage collection) in reverse.
//!
//! A [`ReconciliationCache`] is created for every pass and threaded through the synthesizers so
//! that later kinds can resolve the remote identifiers of resources synthesized earlier in the
//! same pass.
//!
//! [`Stack`]: lattice_controller_core::Stack

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod deployer;
pub mod manager;
mod metrics;
mod store;
pub mod synthesizer;


pub use self::{
    deployer::StackDeployer,
    metrics::DeployMetrics,
    store::{ReconciliationCache, RemoteListener, RemoteRef},
};
