use lattice_controller_core::{ResourceKind, Result};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct DeployMetrics {
    deploys: Family<OutcomeLabels, Counter>,
    synthesize_errors: Family<KindLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    outcome: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: &'static str,
}

impl DeployMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let deploys = Family::default();
        prom.register(
            "stack_deploys",
            "Count of stack deployments by outcome",
            deploys.clone(),
        );

        let synthesize_errors = Family::default();
        prom.register(
            "synthesize_errors",
            "Count of synthesizer failures by resource kind",
            synthesize_errors.clone(),
        );

        Self {
            deploys,
            synthesize_errors,
        }
    }

    pub(crate) fn deployed(&self, result: &Result<()>) {
        let outcome = match result {
            Ok(()) => "success",
            Err(error) if error.is_retry() => "retry",
            Err(_) => "error",
        };
        self.deploys.get_or_create(&OutcomeLabels { outcome }).inc();
    }

    pub(crate) fn synthesize_failed(&self, kind: ResourceKind) {
        self.synthesize_errors
            .get_or_create(&KindLabels {
                kind: kind.as_str(),
            })
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn deploy_count(&self, outcome: &'static str) -> u64 {
        self.deploys.get_or_create(&OutcomeLabels { outcome }).get()
    }
}
