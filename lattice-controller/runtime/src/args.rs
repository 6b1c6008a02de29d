use crate::{
    core::{lookup::NoDns, CloudConfig, NetworkingApi},
    deploy::DeployMetrics,
    k8s::KubeLookup,
    Reconciler,
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "lattice-controller",
    about = "Reconciles Gateway API routes onto a service-networking control plane"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "lattice=info,warn",
        env = "LATTICE_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    /// The 12-digit account that owns the controller's resources.
    #[clap(long, env = "AWS_ACCOUNT_ID")]
    aws_account_id: String,

    #[clap(long, env = "REGION")]
    region: String,

    /// The VPC the cluster's pods run in.
    #[clap(long, env = "CLUSTER_VPC_ID")]
    cluster_vpc_id: String,

    #[clap(long, env = "CLUSTER_NAME")]
    cluster_name: String,

    /// A service network to create and associate with the cluster's VPC at startup.
    #[clap(long, env = "DEFAULT_SERVICE_NETWORK")]
    default_service_network: Option<String>,

    /// Includes the route name and VPC in target group names.
    #[clap(long, env = "ENABLE_LONG_TG_NAME")]
    enable_long_target_group_names: bool,
}

/// A controller ready to reconcile stacks.
pub struct Controller {
    pub reconciler: Reconciler,
    pub prometheus: Registry,
}

impl Args {
    /// Validates the controller's cloud identity.
    pub fn cloud_config(&self) -> Result<CloudConfig> {
        let account_id = self.aws_account_id.trim();
        if account_id.len() != 12 || !account_id.bytes().all(|b| b.is_ascii_digit()) {
            bail!("invalid account id {account_id:?}: expected 12 digits");
        }
        let vpc_id = self.cluster_vpc_id.trim();
        if !vpc_id.starts_with("vpc-") {
            bail!("invalid VPC id {vpc_id:?}: expected a vpc- prefix");
        }
        if self.region.trim().is_empty() {
            bail!("a region must be configured");
        }
        if self.cluster_name.trim().is_empty() {
            bail!("a cluster name must be configured");
        }

        Ok(CloudConfig {
            account_id: account_id.to_string(),
            region: self.region.trim().to_string(),
            vpc_id: vpc_id.to_string(),
            cluster_name: self.cluster_name.trim().to_string(),
            long_target_group_names: self.enable_long_target_group_names,
        })
    }

    /// Initializes logging and the Kubernetes client, registers metrics and ensures the
    /// default service network exists.
    pub async fn build(self, api: Arc<dyn NetworkingApi>) -> Result<Controller> {
        let cloud = Arc::new(self.cloud_config()?);
        let Self {
            log_level,
            log_format,
            client,
            default_service_network,
            ..
        } = self;

        log_format.try_init(log_level)?;
        let client = client.try_client().await?;

        let mut prometheus = <Registry>::default();
        let metrics = DeployMetrics::register(prometheus.sub_registry_with_prefix("lattice"));

        info!(
            account = %cloud.account_id,
            region = %cloud.region,
            vpc = %cloud.vpc_id,
            cluster = %cloud.cluster_name,
            "Starting controller"
        );
        let reconciler = Reconciler::new(
            api,
            cloud,
            Arc::new(KubeLookup::new(client)),
            Arc::new(NoDns),
            metrics,
        )
        .with_default_service_network(default_service_network);
        reconciler.ensure_default_service_network().await?;

        Ok(Controller {
            reconciler,
            prometheus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parse(account: &str, vpc: &str) -> Args {
        Args::try_parse_from([
            "lattice-controller",
            "--aws-account-id",
            account,
            "--region",
            "us-west-2",
            "--cluster-vpc-id",
            vpc,
            "--cluster-name",
            "test-cluster",
        ])
        .expect("arguments must parse")
    }

    #[test]
    fn builds_cloud_config() {
        let cloud = parse("111122223333", "vpc-0123").cloud_config().expect("valid");
        assert_eq!(
            cloud,
            CloudConfig {
                account_id: "111122223333".to_string(),
                region: "us-west-2".to_string(),
                vpc_id: "vpc-0123".to_string(),
                cluster_name: "test-cluster".to_string(),
                long_target_group_names: false,
            }
        );
        assert_eq!(cloud.managed_by(), "111122223333/test-cluster/vpc-0123");
    }

    #[rstest]
    #[case("11112222333", "vpc-0123")]
    #[case("1111222233334", "vpc-0123")]
    #[case("11112222333a", "vpc-0123")]
    #[case("111122223333", "0123")]
    #[case("111122223333", "subnet-0123")]
    fn rejects_malformed_identity(#[case] account: &str, #[case] vpc: &str) {
        assert!(parse(account, vpc).cloud_config().is_err());
    }

    #[test]
    fn long_target_group_names_flag() {
        let args = Args::try_parse_from([
            "lattice-controller",
            "--aws-account-id=111122223333",
            "--region=us-west-2",
            "--cluster-vpc-id=vpc-0123",
            "--cluster-name=test-cluster",
            "--enable-long-target-group-names",
            "--default-service-network=default",
        ])
        .expect("arguments must parse");
        assert!(args.cloud_config().expect("valid").long_target_group_names);
        assert_eq!(args.default_service_network.as_deref(), Some("default"));
    }
}
