//! The two registry flavours: single-engine containers and orchestrators.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ClientKind, RuntimeManager};
use crate::client::{ContainerClient, OrchestratorClient, RuntimeClient};
use crate::clients::{DockerClient, DockerComposeClient};
use crate::settings::keys;

/// Container engine clients. Defaults to the built-in Docker client.
#[derive(Debug)]
pub struct Containers;

#[async_trait]
impl ClientKind for Containers {
    type Client = dyn ContainerClient;

    const NOUN: &'static str = "container";
    const SETTING: &'static str = keys::CONTAINER_CLIENT;

    fn default_client(clients: &[Arc<Self::Client>]) -> Option<Arc<Self::Client>> {
        find_by_id(clients, DockerClient::CLIENT_ID)
    }
}

/// Orchestrator clients. Defaults to the built-in Docker Compose client and
/// runs its slow configuration before handing it out.
#[derive(Debug)]
pub struct Orchestrators;

#[async_trait]
impl ClientKind for Orchestrators {
    type Client = dyn OrchestratorClient;

    const NOUN: &'static str = "orchestrator";
    const SETTING: &'static str = keys::ORCHESTRATOR_CLIENT;

    fn default_client(clients: &[Arc<Self::Client>]) -> Option<Arc<Self::Client>> {
        find_by_id(clients, DockerComposeClient::CLIENT_ID)
    }

    async fn prepare(client: &Self::Client) -> anyhow::Result<()> {
        if let Some(slow) = client.as_slow_configurable() {
            tracing::debug!(client_id = client.id(), "running slow configure");
            slow.slow_configure().await?;
        }
        Ok(())
    }
}

pub type ContainerRuntimeManager = RuntimeManager<Containers>;
pub type OrchestratorRuntimeManager = RuntimeManager<Orchestrators>;

fn find_by_id<C: RuntimeClient + ?Sized>(clients: &[Arc<C>], id: &str) -> Option<Arc<C>> {
    clients.iter().find(|c| c.id() == id).cloned()
}
