#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Kubernetes lookups backing target group garbage collection.
//!
//! Routes and ServiceExports are read as dynamic objects so that the controller works with
//! whichever version of the Gateway API and multicluster CRDs the cluster serves.

mod lookup;
pub mod route;

pub use self::lookup::KubeLookup;
pub use kube::{api::ObjectMeta, Client, ResourceExt};
