use crate::{
    manager::{
        AccessLogSubscriptionManager, ListenerManager, RuleManager, ServiceManager,
        ServiceNetworkManager, TargetGroupManager, TargetsManager,
    },
    synthesizer::{
        AccessLogSubscriptionSynthesizer, ListenerSynthesizer, RuleSynthesizer,
        ServiceNetworkSynthesizer, ServiceSynthesizer, Synthesize, TargetGroupSynthesizer,
        TargetsSynthesizer,
    },
    DeployMetrics, ReconciliationCache,
};
use lattice_controller_core::{
    CloudConfig, DnsEndpointPublisher, Error, KubernetesLookup, NetworkingApi, Result, Stack,
};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Deploys a stack by running each kind's synthesizer in dependency order.
///
/// The first synthesis failure stops the pass. Post-synthesis (deletion and garbage
/// collection) then runs in reverse order, and its failures are aggregated into a single
/// retry unless one of them is terminal. The retry is caused by the last failure.
///
/// A pass may be cancelled by dropping the future. Every step is idempotent, so the next pass
/// picks up where the previous one left off.
pub struct StackDeployer {
    synthesizers: Vec<Box<dyn Synthesize>>,
    metrics: DeployMetrics,
}

impl StackDeployer {
    pub fn new(
        api: Arc<dyn NetworkingApi>,
        cloud: Arc<CloudConfig>,
        k8s: Arc<dyn KubernetesLookup>,
        dns: Arc<dyn DnsEndpointPublisher>,
        metrics: DeployMetrics,
    ) -> Self {
        let target_groups = TargetGroupManager::new(api.clone(), cloud.clone());
        let synthesizers: Vec<Box<dyn Synthesize>> = vec![
            Box::new(ServiceNetworkSynthesizer::new(ServiceNetworkManager::new(
                api.clone(),
                cloud.clone(),
            ))),
            Box::new(TargetGroupSynthesizer::new(target_groups.clone(), k8s)),
            Box::new(TargetsSynthesizer::new(TargetsManager::new(api.clone()))),
            Box::new(ServiceSynthesizer::new(
                ServiceManager::new(api.clone(), cloud.clone()),
                dns,
            )),
            Box::new(ListenerSynthesizer::new(
                ListenerManager::new(api.clone(), cloud.clone()),
                target_groups.clone(),
            )),
            Box::new(RuleSynthesizer::new(
                RuleManager::new(api.clone(), cloud.clone()),
                target_groups,
            )),
            Box::new(AccessLogSubscriptionSynthesizer::new(
                AccessLogSubscriptionManager::new(api, cloud),
            )),
        ];
        Self::with_synthesizers(synthesizers, metrics)
    }

    pub fn with_synthesizers(
        synthesizers: Vec<Box<dyn Synthesize>>,
        metrics: DeployMetrics,
    ) -> Self {
        Self {
            synthesizers,
            metrics,
        }
    }

    /// Converges the remote system onto `stack`, recording remote status in the stack.
    pub async fn deploy(&self, stack: &mut Stack) -> Result<()> {
        let id = stack.id();
        let span = info_span!("deploy", stack.namespace = %id.namespace, stack.name = %id.name);
        let result = self.run(stack).instrument(span).await;
        self.metrics.deployed(&result);
        result
    }

    async fn run(&self, stack: &mut Stack) -> Result<()> {
        let cache = ReconciliationCache::default();
        info!(resources = stack.len(), "Deploying stack");

        for synthesizer in &self.synthesizers {
            let kind = synthesizer.kind();
            debug!(%kind, "Synthesizing");
            if let Err(error) = synthesizer
                .synthesize(stack, &cache)
                .instrument(info_span!("synthesize", %kind))
                .await
            {
                self.metrics.synthesize_failed(kind);
                warn!(%kind, %error, "Synthesis failed");
                return Err(error);
            }
        }

        let mut failed = Vec::new();
        let mut terminal = None;
        let mut last = None;
        for synthesizer in self.synthesizers.iter().rev() {
            let kind = synthesizer.kind();
            if let Err(error) = synthesizer
                .post_synthesize(stack, &cache)
                .instrument(info_span!("post_synthesize", %kind))
                .await
            {
                self.metrics.synthesize_failed(kind);
                warn!(%kind, %error, "Post-synthesis failed");
                failed.push(format!("{kind}: {error}"));
                if error.is_terminal() && terminal.is_none() {
                    terminal = Some(error);
                } else {
                    last = Some(error);
                }
            }
        }
        if let Some(error) = terminal {
            return Err(error);
        }
        if let Some(error) = last {
            return Err(Error::retry_caused_by(
                format!("post-synthesis failed: {}", failed.join("; ")),
                error,
            ));
        }

        info!("Stack deployed");
        Ok(())
    }
}
