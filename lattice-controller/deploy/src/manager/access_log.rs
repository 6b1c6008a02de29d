use crate::ReconciliationCache;
use lattice_controller_core::{
    api::{AccessLogSubscriptionSummary, ApiError, CreateAccessLogSubscriptionRequest},
    model::{AccessLogSource, AccessLogSubscriptionSpec, AccessLogSubscriptionStatus},
    tags::is_arn_managed,
    CloudConfig, Error, NetworkingApi, Result,
};
use std::sync::Arc;
use tracing::info;

/// Manages access log subscriptions on service networks and services.
#[derive(Clone)]
pub struct AccessLogSubscriptionManager {
    api: Arc<dyn NetworkingApi>,
    cloud: Arc<CloudConfig>,
}

impl AccessLogSubscriptionManager {
    pub fn new(api: Arc<dyn NetworkingApi>, cloud: Arc<CloudConfig>) -> Self {
        Self { api, cloud }
    }

    pub async fn create(
        &self,
        spec: &AccessLogSubscriptionSpec,
        cache: &ReconciliationCache,
    ) -> Result<AccessLogSubscriptionStatus> {
        let resource_identifier = self.resolve_source(&spec.source, cache).await?;
        info!(
            source = ?spec.source,
            destination = %spec.destination_arn,
            "Creating access log subscription"
        );
        let created = self
            .api
            .create_access_log_subscription(CreateAccessLogSubscriptionRequest {
                resource_identifier,
                destination_arn: spec.destination_arn.clone(),
                tags: self.cloud.merge_default_tags(spec.tags.clone()),
            })
            .await
            .map_err(map_destination_error)?;
        Ok(status(created))
    }

    /// Points an existing subscription at the desired destination.
    ///
    /// Destinations cannot change type in place, so a change of destination service replaces
    /// the subscription. A subscription that no longer exists is recreated.
    pub async fn update(
        &self,
        arn: &str,
        spec: &AccessLogSubscriptionSpec,
        cache: &ReconciliationCache,
    ) -> Result<AccessLogSubscriptionStatus> {
        let id = resource_id(arn);
        let current = match self.api.get_access_log_subscription(id).await {
            Ok(current) => current,
            Err(ApiError::NotFound(_)) => return self.create(spec, cache).await,
            Err(error) => return Err(error.into()),
        };
        if !is_arn_managed(&*self.api, &self.cloud, &current.arn).await? {
            return Err(Error::conflict(format!(
                "access log subscription {arn} is not managed by this controller"
            )));
        }
        if current.destination_arn == spec.destination_arn {
            return Ok(status(current));
        }

        if destination_type(&current.destination_arn) != destination_type(&spec.destination_arn) {
            info!(%arn, destination = %spec.destination_arn, "Replacing access log subscription");
            self.delete(arn).await?;
            return self.create(spec, cache).await;
        }

        info!(%arn, destination = %spec.destination_arn, "Updating access log subscription");
        let updated = self
            .api
            .update_access_log_subscription(id, &spec.destination_arn)
            .await
            .map_err(map_destination_error)?;
        Ok(status(updated))
    }

    pub async fn delete(&self, arn: &str) -> Result<()> {
        match is_arn_managed(&*self.api, &self.cloud, arn).await {
            Ok(true) => {}
            Ok(false) => {
                info!(%arn, "Access log subscription is not managed by this controller");
                return Ok(());
            }
            Err(error) if error.is_not_found() => return Ok(()),
            Err(error) => return Err(error),
        }
        info!(%arn, "Deleting access log subscription");
        match self.api.delete_access_log_subscription(resource_id(arn)).await {
            Ok(()) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn resolve_source(
        &self,
        source: &AccessLogSource,
        cache: &ReconciliationCache,
    ) -> Result<String> {
        match source {
            AccessLogSource::ServiceNetwork(name) => {
                if let Some(network) = cache.service_network(name) {
                    return Ok(network.arn);
                }
                let network = self
                    .api
                    .find_service_network(name)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("service network {name}")))?;
                Ok(network.arn)
            }
            AccessLogSource::Service(name) => {
                let service = self
                    .api
                    .find_service(name)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("service {name}")))?;
                Ok(service.arn)
            }
        }
    }
}

fn status(summary: AccessLogSubscriptionSummary) -> AccessLogSubscriptionStatus {
    AccessLogSubscriptionStatus {
        arn: summary.arn,
        id: summary.id,
    }
}

/// A missing or malformed destination is a problem with the desired state, not a transient
/// failure.
fn map_destination_error(error: ApiError) -> Error {
    match error {
        ApiError::Conflict(msg) => Error::Conflict(msg),
        ApiError::NotFound(msg) | ApiError::Validation(msg) => Error::Invalid(msg),
        error => error.into(),
    }
}

fn resource_id(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

/// The service segment of a destination ARN, e.g. `s3`, `logs` or `firehose`.
fn destination_type(arn: &str) -> Option<&str> {
    arn.split(':').nth(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arn_segments() {
        let arn = "arn:aws:vpc-lattice:us-west-2:111122223333:accesslogsubscription/als-0123";
        assert_eq!(resource_id(arn), "als-0123");
        assert_eq!(resource_id("als-0123"), "als-0123");

        assert_eq!(destination_type("arn:aws:s3:::bucket"), Some("s3"));
        assert_eq!(
            destination_type("arn:aws:logs:us-west-2:111122223333:log-group:lg"),
            Some("logs")
        );
        assert_ne!(
            destination_type("arn:aws:s3:::bucket"),
            destination_type("arn:aws:firehose:us-west-2:111122223333:deliverystream/ds")
        );
    }

    #[test]
    fn destination_errors_are_invalid() {
        assert!(matches!(
            map_destination_error(ApiError::NotFound("bucket".into())),
            Error::Invalid(_)
        ));
        assert!(matches!(
            map_destination_error(ApiError::Validation("bad".into())),
            Error::Invalid(_)
        ));
        assert!(map_destination_error(ApiError::Conflict("dup".into())).is_conflict());
        assert!(map_destination_error(ApiError::Throttled("slow".into())).is_retry());
    }
}
