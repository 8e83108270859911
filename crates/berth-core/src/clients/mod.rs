//! Built-in runtime clients.
//!
//! Docker and Podman are container engines whose command follows
//! `containers.containerCommand`; Docker Compose is the default orchestrator
//! and probes for compose v2 the first time it is resolved. [`CliClient`]
//! covers any other engine declared in configuration.

pub mod cli;
pub mod compose;
pub mod docker;
pub mod podman;

pub use cli::CliClient;
pub use compose::{ComposeProbe, DockerComposeClient, ProcessComposeProbe};
pub use docker::DockerClient;
pub use podman::PodmanClient;

use crate::settings::SettingsSource;

/// The configured command for `key`, or `fallback` when unset or blank.
fn configured_command(settings: &dyn SettingsSource, key: &str, fallback: &str) -> String {
    settings
        .get_non_empty(key)
        .map(|command| command.trim().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn configured_command_falls_back_when_blank() {
        let mut settings = HashMap::new();
        assert_eq!(configured_command(&settings, "k", "docker"), "docker");

        settings.insert("k".to_string(), "   ".to_string());
        assert_eq!(configured_command(&settings, "k", "docker"), "docker");

        settings.insert("k".to_string(), " /opt/bin/docker ".to_string());
        assert_eq!(configured_command(&settings, "k", "docker"), "/opt/bin/docker");
    }
}
