//! Podman CLI client.

use crate::client::{AutoConfigurable, CommandName, ContainerClient, RuntimeClient};
use crate::settings::{SettingsSource, keys};

/// The Podman engine, driven through the `podman` CLI (or whatever
/// `containers.containerCommand` points at).
#[derive(Debug)]
pub struct PodmanClient {
    command: CommandName,
}

impl PodmanClient {
    pub const CLIENT_ID: &'static str = "com.microsoft.visualstudio.containers.podman";
    pub const DEFAULT_COMMAND: &'static str = "podman";

    pub fn new(settings: &dyn SettingsSource) -> Self {
        let client = Self {
            command: CommandName::new(Self::DEFAULT_COMMAND),
        };
        client.reconfigure(settings);
        client
    }
}

impl RuntimeClient for PodmanClient {
    fn id(&self) -> &str {
        Self::CLIENT_ID
    }

    fn command_name(&self) -> String {
        self.command.get()
    }

    fn display_name(&self) -> &str {
        "Podman"
    }

    fn description(&self) -> &str {
        "Use Podman as the container runtime"
    }

    fn as_auto_configurable(&self) -> Option<&dyn AutoConfigurable> {
        Some(self)
    }
}

impl ContainerClient for PodmanClient {}

impl AutoConfigurable for PodmanClient {
    fn reconfigure(&self, settings: &dyn SettingsSource) {
        let command =
            super::configured_command(settings, keys::CONTAINER_COMMAND, Self::DEFAULT_COMMAND);
        tracing::debug!(client_id = Self::CLIENT_ID, command = %command, "container command configured");
        self.command.set(command);
    }
}
