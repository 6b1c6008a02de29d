/// Identity of the controller instance within the cloud account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudConfig {
    pub account_id: String,
    pub region: String,
    pub vpc_id: String,
    pub cluster_name: String,

    /// Include route and VPC disambiguators in target group names.
    pub long_target_group_names: bool,
}

impl CloudConfig {
    /// The value this controller writes to the `ManagedBy` tag.
    ///
    /// Multiple controllers may run in one account, so the value is scoped by cluster and VPC.
    pub fn managed_by(&self) -> String {
        format!("{}/{}/{}", self.account_id, self.cluster_name, self.vpc_id)
    }
}
