//! Provider clients declared in configuration.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clients::CliClient;

/// Which registry a provider joins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Container,
    Orchestrator,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Container => f.write_str("container"),
            Self::Orchestrator => f.write_str("orchestrator"),
        }
    }
}

/// A `[[providers]]` entry: an extra engine registered after startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub id: String,
    /// Defaults to the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: ProviderKind,
    /// How long after activation the provider registers.
    #[serde(default)]
    pub activation_delay_ms: u64,
}

impl ProviderSpec {
    pub fn new(id: impl Into<String>, command: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            command: command.into(),
            description: None,
            kind,
            activation_delay_ms: 0,
        }
    }

    pub fn activation_delay(&self) -> Duration {
        Duration::from_millis(self.activation_delay_ms)
    }

    /// Build the client this provider registers.
    pub fn to_client(&self) -> Arc<CliClient> {
        let display_name = self.display_name.as_deref().unwrap_or(&self.id);
        let mut client = CliClient::new(&self.id, display_name, &self.command);
        if let Some(description) = &self.description {
            client = client.with_description(description);
        }
        Arc::new(client)
    }
}
