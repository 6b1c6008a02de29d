use lattice_controller_core::{
    api::{ApiError, CreateListenerRequest, ListenerProtocol, ListenerSummary, RuleAction},
    model::{ListenerSpec, ListenerStatus},
    tags::is_arn_managed,
    CloudConfig, NetworkingApi, Result,
};
use std::sync::Arc;
use tracing::info;

/// Manages listeners, which are identified within a service by port and protocol.
#[derive(Clone)]
pub struct ListenerManager {
    api: Arc<dyn NetworkingApi>,
    cloud: Arc<CloudConfig>,
}

impl ListenerManager {
    pub fn new(api: Arc<dyn NetworkingApi>, cloud: Arc<CloudConfig>) -> Self {
        Self { api, cloud }
    }

    /// Returns the listener on `service_id` with the desired port and protocol, creating it
    /// with `default_action` if there is none. Existing listeners are never modified.
    pub async fn upsert(
        &self,
        spec: &ListenerSpec,
        service_id: &str,
        default_action: RuleAction,
    ) -> Result<ListenerStatus> {
        let existing = self
            .api
            .list_listeners(service_id)
            .await?
            .into_iter()
            .find(|l| l.port == spec.port && l.protocol == spec.protocol);
        let listener = match existing {
            Some(listener) => listener,
            None => {
                let name = listener_name(spec.port, spec.protocol);
                info!(%service_id, %name, "Creating listener");
                self.api
                    .create_listener(CreateListenerRequest {
                        service_id: service_id.to_string(),
                        name,
                        port: spec.port,
                        protocol: spec.protocol,
                        default_action,
                        tags: self.cloud.default_tags(),
                    })
                    .await?
            }
        };

        Ok(ListenerStatus {
            arn: listener.arn,
            id: listener.id,
            name: listener.name,
            service_id: service_id.to_string(),
        })
    }

    pub async fn list(&self, service_id: &str) -> Result<Vec<ListenerSummary>> {
        Ok(self.api.list_listeners(service_id).await?)
    }

    /// Deletes the listener unless it is managed by someone else.
    pub async fn delete(&self, listener: &ListenerSummary, service_id: &str) -> Result<()> {
        let name = &listener.name;
        if !is_arn_managed(&*self.api, &self.cloud, &listener.arn).await? {
            info!(%service_id, %name, "Listener is not managed by this controller");
            return Ok(());
        }
        info!(%service_id, %name, "Deleting listener");
        match self.api.delete_listener(service_id, &listener.id).await {
            Ok(()) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

fn listener_name(port: u16, protocol: ListenerProtocol) -> String {
    format!(
        "k8s-{port}-{}",
        protocol.as_str().to_ascii_lowercase().replace('_', "-")
    )
}
