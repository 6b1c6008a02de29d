use ahash::AHashMap as HashMap;
use lattice_controller_core::{Error, Result};
use parking_lot::Mutex;

/// Remote identifiers of a resource synthesized during the current pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteRef {
    pub arn: String,
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteListener {
    pub arn: String,
    pub id: String,
    pub service_id: String,
}

/// Resolves cross-resource references within one reconciliation pass.
///
/// Entries are keyed by stack ID, except service networks, which are keyed by name since
/// services refer to them by name. A cache lives for exactly one pass and is never shared
/// between passes. It holds identifiers only; ownership is always re-read from the remote
/// system.
#[derive(Debug, Default)]
pub struct ReconciliationCache {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    service_networks: HashMap<String, RemoteRef>,
    services: HashMap<String, RemoteRef>,
    listeners: HashMap<String, RemoteListener>,
    target_groups: HashMap<String, RemoteRef>,
}

impl ReconciliationCache {
    pub fn put_service_network(&self, name: &str, remote: RemoteRef) {
        self.inner
            .lock()
            .service_networks
            .insert(name.to_string(), remote);
    }

    pub fn service_network(&self, name: &str) -> Option<RemoteRef> {
        self.inner.lock().service_networks.get(name).cloned()
    }

    pub fn put_service(&self, stack_id: &str, remote: RemoteRef) {
        self.inner
            .lock()
            .services
            .insert(stack_id.to_string(), remote);
    }

    pub fn service(&self, stack_id: &str) -> Result<RemoteRef> {
        self.inner
            .lock()
            .services
            .get(stack_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("service {stack_id} not yet synthesized")))
    }

    pub fn put_listener(&self, stack_id: &str, remote: RemoteListener) {
        self.inner
            .lock()
            .listeners
            .insert(stack_id.to_string(), remote);
    }

    pub fn listener(&self, stack_id: &str) -> Result<RemoteListener> {
        self.inner
            .lock()
            .listeners
            .get(stack_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("listener {stack_id} not yet synthesized")))
    }

    pub fn put_target_group(&self, stack_id: &str, remote: RemoteRef) {
        self.inner
            .lock()
            .target_groups
            .insert(stack_id.to_string(), remote);
    }

    pub fn target_group(&self, stack_id: &str) -> Result<RemoteRef> {
        self.inner
            .lock()
            .target_groups
            .get(stack_id)
            .cloned()
            .ok_or_else(|| {
                Error::not_found(format!("target group {stack_id} not yet synthesized"))
            })
    }
}
