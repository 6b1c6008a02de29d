use crate::{
    core::{
        model::{ServiceNetwork, ServiceNetworkSpec},
        CloudConfig, DnsEndpointPublisher, KubernetesLookup, NetworkingApi, Result, Stack,
        StackId,
    },
    deploy::{DeployMetrics, StackDeployer},
};
use std::sync::Arc;
use tracing::info;

/// The namespace of the stack holding the default service network, which belongs to no
/// Kubernetes object.
const CONTROLLER_STACK_NAMESPACE: &str = "lattice-system";

/// Deploys stacks built by the route builder.
///
/// Each call to [`Reconciler::reconcile`] is one independent pass. Passes for different
/// stacks may run concurrently.
pub struct Reconciler {
    deployer: StackDeployer,
    default_service_network: Option<String>,
}

impl Reconciler {
    pub fn new(
        api: Arc<dyn NetworkingApi>,
        cloud: Arc<CloudConfig>,
        k8s: Arc<dyn KubernetesLookup>,
        dns: Arc<dyn DnsEndpointPublisher>,
        metrics: DeployMetrics,
    ) -> Self {
        Self {
            deployer: StackDeployer::new(api, cloud, k8s, dns, metrics),
            default_service_network: None,
        }
    }

    pub fn with_default_service_network(mut self, name: Option<String>) -> Self {
        self.default_service_network = name;
        self
    }

    pub fn default_service_network(&self) -> Option<&str> {
        self.default_service_network.as_deref()
    }

    pub async fn reconcile(&self, stack: &mut Stack) -> Result<()> {
        self.deployer.deploy(stack).await
    }

    /// Creates the default service network, if one is configured, and associates the
    /// cluster's VPC with it.
    pub async fn ensure_default_service_network(&self) -> Result<()> {
        let Some(name) = self.default_service_network.as_deref() else {
            return Ok(());
        };
        info!(%name, "Ensuring default service network");
        let mut stack = default_network_stack(name)?;
        self.reconcile(&mut stack).await
    }
}

pub(crate) fn default_network_stack(name: &str) -> Result<Stack> {
    let mut stack = Stack::new(StackId::new(CONTROLLER_STACK_NAMESPACE, name));
    stack.add(ServiceNetwork::new(
        name,
        ServiceNetworkSpec {
            name: name.to_string(),
            associate_to_vpc: true,
            ..Default::default()
        },
    ))?;
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_network_stack_associates_vpc() {
        let stack = default_network_stack("default").expect("stack");
        assert_eq!(stack.len(), 1);
        let network = stack.get::<ServiceNetwork>("default").expect("network");
        assert_eq!(network.spec.name, "default");
        assert!(network.spec.associate_to_vpc);
        assert!(!network.spec.is_deleted);
        assert_eq!(network.spec.account, None);
    }
}
