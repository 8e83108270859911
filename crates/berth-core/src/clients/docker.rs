//! Docker CLI client.

use crate::client::{AutoConfigurable, CommandName, ContainerClient, RuntimeClient};
use crate::settings::{SettingsSource, keys};

/// The Docker engine, driven through the `docker` CLI (or whatever
/// `containers.containerCommand` points at).
#[derive(Debug)]
pub struct DockerClient {
    command: CommandName,
}

impl DockerClient {
    /// Well-known id; the container registry falls back to this client when
    /// no preference is configured.
    pub const CLIENT_ID: &'static str = "com.microsoft.visualstudio.containers.docker";
    pub const DEFAULT_COMMAND: &'static str = "docker";

    pub fn new(settings: &dyn SettingsSource) -> Self {
        let client = Self {
            command: CommandName::new(Self::DEFAULT_COMMAND),
        };
        client.reconfigure(settings);
        client
    }
}

impl RuntimeClient for DockerClient {
    fn id(&self) -> &str {
        Self::CLIENT_ID
    }

    fn command_name(&self) -> String {
        self.command.get()
    }

    fn display_name(&self) -> &str {
        "Docker"
    }

    fn description(&self) -> &str {
        "Use Docker as the container runtime"
    }

    fn as_auto_configurable(&self) -> Option<&dyn AutoConfigurable> {
        Some(self)
    }
}

impl ContainerClient for DockerClient {}

impl AutoConfigurable for DockerClient {
    fn reconfigure(&self, settings: &dyn SettingsSource) {
        let command =
            super::configured_command(settings, keys::CONTAINER_COMMAND, Self::DEFAULT_COMMAND);
        tracing::debug!(client_id = Self::CLIENT_ID, command = %command, "container command configured");
        self.command.set(command);
    }
}
