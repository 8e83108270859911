//! A plain command-line engine with a fixed command.

use crate::client::{ContainerClient, OrchestratorClient, RuntimeClient};

/// Client for any engine that only needs an id and a command, such as
/// providers declared in the config file (`nerdctl`, `podman-compose`, ...).
///
/// Registrable in either registry.
#[derive(Debug, Clone)]
pub struct CliClient {
    id: String,
    display_name: String,
    command: String,
    description: String,
}

impl CliClient {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            command: command.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl RuntimeClient for CliClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn command_name(&self) -> String {
        self.command.clone()
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl ContainerClient for CliClient {}
impl OrchestratorClient for CliClient {}
