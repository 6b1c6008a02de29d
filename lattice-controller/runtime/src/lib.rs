#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Wires the lattice controller's reconciliation engine to its process environment.

pub use lattice_controller_core as core;
pub use lattice_controller_deploy as deploy;
pub use lattice_controller_k8s_api as k8s;

mod args;
mod reconciler;

pub use self::{
    args::{Args, Controller},
    reconciler::Reconciler,
};
