//! Runtime client traits -- the identity every registrable engine client
//! exposes, plus the optional capabilities a client may opt into.
//!
//! Capabilities are reached through `as_*` accessors rather than downcasts,
//! so any client can advertise them regardless of its concrete type:
//!
//! ```text
//! RuntimeClient ──as_auto_configurable()──> Option<&dyn AutoConfigurable>
//!     │
//!     ├── ContainerClient      (single-engine: docker, podman, ...)
//!     └── OrchestratorClient ──as_slow_configurable()──> Option<&dyn SlowConfigurable>
//! ```

use std::fmt;
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::settings::SettingsSource;

/// Identity shared by every client a registry can hold.
///
/// Only [`id`](RuntimeClient::id) takes part in lookup; the command name is
/// mutable and must be re-read on every use.
pub trait RuntimeClient: fmt::Debug + Send + Sync + 'static {
    /// Stable identifier, unique among clients of the same registry.
    fn id(&self) -> &str;

    /// The executable (or executable plus leading arguments) used to drive
    /// the engine, as currently configured.
    fn command_name(&self) -> String;

    /// Human-readable engine name (e.g. "Docker").
    fn display_name(&self) -> &str;

    /// Short description shown next to the display name.
    fn description(&self) -> &str {
        ""
    }

    /// Returns the reconfigure capability if this client supports it.
    fn as_auto_configurable(&self) -> Option<&dyn AutoConfigurable> {
        None
    }
}

/// A client for a single container engine (docker, podman, ...).
pub trait ContainerClient: RuntimeClient {}

/// A client for a multi-container orchestrator (compose and friends).
pub trait OrchestratorClient: RuntimeClient {
    /// Returns the slow-configure capability if this client needs one-time
    /// setup before first use.
    fn as_slow_configurable(&self) -> Option<&dyn SlowConfigurable> {
        None
    }
}

/// Clients whose command name follows configuration.
///
/// Invoked by the configuration-change listener whenever a relevant setting
/// changes. Must be idempotent.
pub trait AutoConfigurable: Send + Sync {
    /// Re-read configuration and update the command name in place.
    fn reconfigure(&self, settings: &dyn SettingsSource);
}

/// Clients that need potentially slow, one-time asynchronous setup.
///
/// Implementations keep their own "already configured" bookkeeping; callers
/// may invoke this on every resolution.
#[async_trait]
pub trait SlowConfigurable: Send + Sync {
    async fn slow_configure(&self) -> Result<()>;
}

// Compile-time assertion: the client traits must be object-safe.
const _: () = {
    fn _assert_object_safe(
        _: &dyn ContainerClient,
        _: &dyn OrchestratorClient,
        _: &dyn AutoConfigurable,
        _: &dyn SlowConfigurable,
    ) {
    }
};

/// Interior-mutable command name shared by the built-in clients.
#[derive(Debug)]
pub struct CommandName(RwLock<String>);

impl CommandName {
    pub fn new(command: impl Into<String>) -> Self {
        Self(RwLock::new(command.into()))
    }

    pub fn get(&self) -> String {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, command: impl Into<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = command.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Plain;

    impl RuntimeClient for Plain {
        fn id(&self) -> &str {
            "plain"
        }

        fn command_name(&self) -> String {
            "plain".to_string()
        }

        fn display_name(&self) -> &str {
            "Plain"
        }
    }

    impl ContainerClient for Plain {}
    impl OrchestratorClient for Plain {}

    #[test]
    fn capabilities_default_to_none() {
        let container: Box<dyn ContainerClient> = Box::new(Plain);
        assert!(container.as_auto_configurable().is_none());
        assert_eq!(container.description(), "");

        let orchestrator: Box<dyn OrchestratorClient> = Box::new(Plain);
        assert!(orchestrator.as_slow_configurable().is_none());
    }

    #[test]
    fn client_trait_objects_are_debug() {
        let client: std::sync::Arc<dyn ContainerClient> = std::sync::Arc::new(Plain);
        let resolved: Result<_, ()> = Ok(client);
        assert_eq!(format!("{:?}", resolved), "Ok(Plain)");
    }

    #[test]
    fn command_name_updates_in_place() {
        let name = CommandName::new("docker");
        assert_eq!(name.get(), "docker");
        name.set("/usr/local/bin/docker");
        assert_eq!(name.get(), "/usr/local/bin/docker");
    }
}
