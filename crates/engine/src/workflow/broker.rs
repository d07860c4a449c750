//! Registering or refreshing a service broker by name.

use foundry_types::{BrokerRegistration, Guid, ResourceKind, ResourceRef};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Orchestrator;
use crate::{
    error::{Step, WorkflowError},
    policy::run_required,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BrokerAction {
    Registered,
    Updated { broker: Guid },
}

impl Orchestrator {
    /// Make sure a broker named `registration.name` exists with the given
    /// URL and credentials, updating it in place when it is already known.
    pub async fn ensure_broker(&self, registration: &BrokerRegistration, cancel: &CancellationToken) -> Result<BrokerAction, WorkflowError> {
        let lookup = ResourceRef::new(ResourceKind::ServiceBroker, registration.name.as_str());
        let existing = run_required(cancel, Step::FetchBrokers, &lookup, self.gateway.brokers_named(&registration.name)).await?;

        let action = match existing.resources.into_iter().next() {
            Some(broker) => {
                let broker_ref = ResourceRef::new(ResourceKind::ServiceBroker, broker.metadata.guid.clone());
                run_required(
                    cancel,
                    Step::UpdateBroker,
                    &broker_ref,
                    self.gateway.update_broker(&broker.metadata.guid, registration),
                )
                .await?;
                BrokerAction::Updated {
                    broker: broker.metadata.guid,
                }
            }
            None => {
                run_required(cancel, Step::RegisterBroker, &lookup, self.gateway.register_broker(registration)).await?;
                BrokerAction::Registered
            }
        };

        info!(broker = %registration.name, url = %registration.broker_url, ?action, "service broker ensured");
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{settings::EngineSettings, testing::ScriptedGateway};

    fn registration() -> BrokerRegistration {
        BrokerRegistration {
            name: "mysql".to_string(),
            broker_url: "https://broker.example.com".to_string(),
            auth_username: "admin".to_string(),
            auth_password: "hunter2".to_string(),
        }
    }

    #[tokio::test]
    async fn registers_unknown_broker() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .ok("GET /v2/service_brokers?q=name:mysql", json!({ "total_results": 0, "resources": [] }))
            .ok_empty("POST /v2/service_brokers");

        let action = Orchestrator::new(gateway.clone(), EngineSettings::default())
            .ensure_broker(&registration(), &CancellationToken::new())
            .await
            .expect("registered");

        assert_eq!(action, BrokerAction::Registered);
        assert_eq!(gateway.bodies("POST /v2/service_brokers")[0]["broker_url"], "https://broker.example.com");
    }

    #[tokio::test]
    async fn updates_existing_broker_in_place() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway
            .ok(
                "GET /v2/service_brokers?q=name:mysql",
                json!({ "total_results": 1, "resources": [ { "metadata": { "guid": "broker-1" }, "entity": { "name": "mysql" } } ] }),
            )
            .ok_empty("PUT /v2/service_brokers/broker-1");

        let action = Orchestrator::new(gateway.clone(), EngineSettings::default())
            .ensure_broker(&registration(), &CancellationToken::new())
            .await
            .expect("updated");

        assert_eq!(
            action,
            BrokerAction::Updated {
                broker: Guid::from("broker-1")
            }
        );
        assert_eq!(gateway.count("POST /v2/service_brokers"), 0);
    }
}
