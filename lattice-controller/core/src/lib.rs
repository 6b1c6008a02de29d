//! Core types for the lattice controller.
//!
//! The controller converges a declarative [`Stack`] of networking resources onto a managed,
//! eventually-consistent service-networking control plane. This crate holds everything that does
//! not perform I/O:
//!
//! - The desired-state model ([`model`]), built once per reconciliation pass by an external
//!   route-building collaborator.
//! - The [`NetworkingApi`] capability consumed by the resource managers, with its request and
//!   response types.
//! - The ownership and tagging protocol ([`tags`]) that gates every mutation of a pre-existing
//!   remote resource.
//! - The error taxonomy shared by managers and synthesizers.
//!
//! ```text
//! [ Stack ] -> [ Deployer ] -> [ Synthesizer ]* -> [ Manager ]* -> [ NetworkingApi ]
//! ```

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod api;
mod config;
mod error;
pub mod lookup;
pub mod model;
pub mod tags;

pub use self::{
    api::{ApiError, NetworkingApi, ResourceStatus, Tags},
    config::CloudConfig,
    error::{Error, Result},
    lookup::{DnsEndpointPublisher, KubernetesLookup},
    model::{ResourceKind, ResourceMeta, Stack, StackId},
};

pub const CONTROLLER_NAME: &str = "application-networking.k8s.aws/gateway-api-controller";
