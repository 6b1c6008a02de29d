//! The remote networking capability consumed by the resource managers.
//!
//! [`NetworkingApi`] exposes only the operations the managers need. It is implemented by an
//! adapter over a cloud SDK (out of scope here) and, in tests, by an in-memory fake. List
//! operations are expected to be fully paginated by the implementation.

use async_trait::async_trait;
use std::{collections::BTreeMap, fmt};

pub type Tags = BTreeMap<String, String>;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Lifecycle status reported by the remote system for services, target groups and
/// associations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceStatus {
    CreateInProgress,
    Active,
    UpdateInProgress,
    DeleteInProgress,
    CreateFailed,
    UpdateFailed,
    DeleteFailed,
}

// === Service networks ===

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceNetworkSummary {
    pub arn: String,
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateServiceNetworkRequest {
    pub name: String,
    pub tags: Tags,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VpcAssociationSummary {
    pub arn: String,
    pub id: String,
    pub service_network_id: String,
    pub vpc_id: String,
    pub status: ResourceStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VpcAssociationDetails {
    pub arn: String,
    pub id: String,
    pub status: ResourceStatus,
    pub security_group_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateVpcAssociationRequest {
    pub service_network_id: String,
    pub vpc_id: String,
    pub security_group_ids: Vec<String>,
    pub tags: Tags,
}

/// Returned by association create/update/delete calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssociationOutput {
    pub arn: String,
    pub id: String,
    pub status: ResourceStatus,
}

// === Services ===

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceSummary {
    pub arn: String,
    pub id: String,
    pub name: String,
    pub status: ResourceStatus,
    pub dns_name: Option<String>,
    pub custom_domain_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateServiceRequest {
    pub name: String,
    pub custom_domain_name: Option<String>,
    pub certificate_arn: Option<String>,
    pub tags: Tags,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceAssociationSummary {
    pub arn: String,
    pub id: String,
    pub service_id: String,
    pub service_network_id: String,
    pub service_network_name: String,
    pub status: ResourceStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateServiceAssociationRequest {
    pub service_id: String,
    pub service_network_id: String,
    pub tags: Tags,
}

// === Listeners ===

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListenerProtocol {
    Http,
    Https,
    TlsPassthrough,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerSummary {
    pub arn: String,
    pub id: String,
    pub name: String,
    pub port: u16,
    pub protocol: ListenerProtocol,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateListenerRequest {
    pub service_id: String,
    pub name: String,
    pub port: u16,
    pub protocol: ListenerProtocol,
    pub default_action: RuleAction,
    pub tags: Tags,
}

// === Rules ===

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathMatch {
    Exact(String),
    Prefix(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HeaderMatch {
    pub name: String,
    pub exact: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpMatch {
    pub path: Option<PathMatch>,
    pub method: Option<String>,
    pub headers: Vec<HeaderMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WeightedTargetGroup {
    pub target_group_id: String,
    pub weight: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleAction {
    Forward(Vec<WeightedTargetGroup>),
    FixedResponse { status_code: u16 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleSummary {
    pub arn: String,
    pub id: String,
    pub name: String,
    pub priority: u32,
    pub is_default: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleDetails {
    pub arn: String,
    pub id: String,
    pub name: String,
    pub priority: u32,
    pub is_default: bool,
    pub matcher: HttpMatch,
    pub action: RuleAction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateRuleRequest {
    pub service_id: String,
    pub listener_id: String,
    pub name: String,
    pub priority: u32,
    pub matcher: HttpMatch,
    pub action: RuleAction,
    pub tags: Tags,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateRuleRequest {
    pub service_id: String,
    pub listener_id: String,
    pub rule_id: String,
    pub matcher: Option<HttpMatch>,
    pub priority: Option<u32>,
    pub action: Option<RuleAction>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RulePriorityUpdate {
    pub rule_id: String,
    pub priority: u32,
}

// === Target groups ===

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetGroupProtocol {
    Http,
    Https,
    Tcp,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    Http1,
    Http2,
    Grpc,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum IpAddressType {
    #[default]
    Ipv4,
    Ipv6,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HealthCheckConfig {
    pub enabled: bool,
    pub path: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<TargetGroupProtocol>,
    pub protocol_version: Option<ProtocolVersion>,
    pub interval_seconds: Option<u32>,
    pub timeout_seconds: Option<u32>,
    pub healthy_threshold_count: Option<u32>,
    pub unhealthy_threshold_count: Option<u32>,
    /// HTTP status codes considered healthy, e.g. `200-299`.
    pub matcher: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetGroupConfig {
    pub port: u16,
    pub protocol: TargetGroupProtocol,
    pub protocol_version: ProtocolVersion,
    pub vpc_id: String,
    pub ip_address_type: IpAddressType,
    pub health_check: Option<HealthCheckConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetGroupSummary {
    pub arn: String,
    pub id: String,
    pub name: String,
    pub status: ResourceStatus,
    pub vpc_id: String,
    pub port: u16,
    pub protocol: TargetGroupProtocol,
    pub protocol_version: ProtocolVersion,
    /// Services whose rules currently forward to this target group.
    pub service_arns: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetGroupDetails {
    pub summary: TargetGroupSummary,
    pub health_check: Option<HealthCheckConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateTargetGroupRequest {
    pub name: String,
    pub config: TargetGroupConfig,
    pub tags: Tags,
}

// === Targets ===

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
    pub ip: String,
    pub port: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetStatus {
    Draining,
    Unavailable,
    Healthy,
    Unhealthy,
    Initial,
    Unused,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetSummary {
    pub target: Target,
    pub status: TargetStatus,
    pub reason_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetFailure {
    pub target: Target,
    pub failure_code: String,
    pub failure_message: String,
}

// === Access log subscriptions ===

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessLogSubscriptionSummary {
    pub arn: String,
    pub id: String,
    pub resource_arn: String,
    pub destination_arn: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateAccessLogSubscriptionRequest {
    /// ID or ARN of the service network or service whose traffic is logged.
    pub resource_identifier: String,
    pub destination_arn: String,
    pub tags: Tags,
}

/// Models the remote service-networking control plane.
#[async_trait]
pub trait NetworkingApi: Send + Sync {
    async fn find_service_network(&self, name: &str) -> ApiResult<Option<ServiceNetworkSummary>>;

    async fn create_service_network(
        &self,
        req: CreateServiceNetworkRequest,
    ) -> ApiResult<ServiceNetworkSummary>;

    async fn delete_service_network(&self, id: &str) -> ApiResult<()>;

    async fn list_vpc_associations(
        &self,
        service_network_id: &str,
    ) -> ApiResult<Vec<VpcAssociationSummary>>;

    async fn get_vpc_association(&self, id: &str) -> ApiResult<VpcAssociationDetails>;

    async fn create_vpc_association(
        &self,
        req: CreateVpcAssociationRequest,
    ) -> ApiResult<AssociationOutput>;

    async fn update_vpc_association(
        &self,
        id: &str,
        security_group_ids: Vec<String>,
    ) -> ApiResult<AssociationOutput>;

    async fn delete_vpc_association(&self, id: &str) -> ApiResult<AssociationOutput>;

    async fn find_service(&self, name: &str) -> ApiResult<Option<ServiceSummary>>;

    async fn create_service(&self, req: CreateServiceRequest) -> ApiResult<ServiceSummary>;

    async fn delete_service(&self, id: &str) -> ApiResult<()>;

    async fn list_service_associations(
        &self,
        service_id: &str,
    ) -> ApiResult<Vec<ServiceAssociationSummary>>;

    async fn create_service_association(
        &self,
        req: CreateServiceAssociationRequest,
    ) -> ApiResult<AssociationOutput>;

    async fn delete_service_association(&self, id: &str) -> ApiResult<()>;

    async fn list_listeners(&self, service_id: &str) -> ApiResult<Vec<ListenerSummary>>;

    async fn create_listener(&self, req: CreateListenerRequest) -> ApiResult<ListenerSummary>;

    async fn delete_listener(&self, service_id: &str, listener_id: &str) -> ApiResult<()>;

    async fn list_rules(&self, service_id: &str, listener_id: &str)
        -> ApiResult<Vec<RuleSummary>>;

    async fn get_rule(
        &self,
        service_id: &str,
        listener_id: &str,
        rule_id: &str,
    ) -> ApiResult<RuleDetails>;

    async fn create_rule(&self, req: CreateRuleRequest) -> ApiResult<RuleSummary>;

    async fn update_rule(&self, req: UpdateRuleRequest) -> ApiResult<()>;

    /// Updates the priority of several rules in a single call.
    async fn batch_update_rule_priorities(
        &self,
        service_id: &str,
        listener_id: &str,
        updates: Vec<RulePriorityUpdate>,
    ) -> ApiResult<()>;

    async fn delete_rule(&self, service_id: &str, listener_id: &str, rule_id: &str)
        -> ApiResult<()>;

    /// Lists target groups, optionally restricted to a single VPC.
    async fn list_target_groups(&self, vpc_id: Option<&str>)
        -> ApiResult<Vec<TargetGroupSummary>>;

    async fn get_target_group(&self, id: &str) -> ApiResult<TargetGroupDetails>;

    async fn create_target_group(
        &self,
        req: CreateTargetGroupRequest,
    ) -> ApiResult<TargetGroupSummary>;

    async fn update_target_group_health_check(
        &self,
        id: &str,
        health_check: HealthCheckConfig,
    ) -> ApiResult<()>;

    async fn delete_target_group(&self, id: &str) -> ApiResult<()>;

    async fn list_targets(&self, target_group_id: &str) -> ApiResult<Vec<TargetSummary>>;

    /// Returns the targets that could not be registered.
    async fn register_targets(
        &self,
        target_group_id: &str,
        targets: Vec<Target>,
    ) -> ApiResult<Vec<TargetFailure>>;

    /// Returns the targets that could not be deregistered.
    async fn deregister_targets(
        &self,
        target_group_id: &str,
        targets: Vec<Target>,
    ) -> ApiResult<Vec<TargetFailure>>;

    async fn create_access_log_subscription(
        &self,
        req: CreateAccessLogSubscriptionRequest,
    ) -> ApiResult<AccessLogSubscriptionSummary>;

    async fn get_access_log_subscription(
        &self,
        id: &str,
    ) -> ApiResult<AccessLogSubscriptionSummary>;

    async fn update_access_log_subscription(
        &self,
        id: &str,
        destination_arn: &str,
    ) -> ApiResult<AccessLogSubscriptionSummary>;

    async fn delete_access_log_subscription(&self, id: &str) -> ApiResult<()>;

    async fn list_tags(&self, arn: &str) -> ApiResult<Tags>;

    async fn tag_resource(&self, arn: &str, tags: Tags) -> ApiResult<()>;
}

// === impl ResourceStatus ===

impl ResourceStatus {
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            Self::CreateInProgress | Self::UpdateInProgress | Self::DeleteInProgress
        )
    }

    pub fn is_failed(self) -> bool {
        matches!(
            self,
            Self::CreateFailed | Self::UpdateFailed | Self::DeleteFailed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::Active => "ACTIVE",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::CreateFailed => "CREATE_FAILED",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::DeleteFailed => "DELETE_FAILED",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl ListenerProtocol ===

impl ListenerProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
            Self::TlsPassthrough => "TLS_PASSTHROUGH",
        }
    }
}

impl fmt::Display for ListenerProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl TargetGroupProtocol ===

impl TargetGroupProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
            Self::Tcp => "TCP",
        }
    }
}

impl fmt::Display for TargetGroupProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl ProtocolVersion ===

impl ProtocolVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http1 => "HTTP1",
            Self::Http2 => "HTTP2",
            Self::Grpc => "GRPC",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Target ===

impl Target {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

// === impl RuleAction ===

impl RuleAction {
    pub const NOT_FOUND: Self = Self::FixedResponse { status_code: 404 };
    pub const INTERNAL_ERROR: Self = Self::FixedResponse { status_code: 500 };
}
