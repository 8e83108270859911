//! `berth resolve` and `berth command`: resolve the active client.

use std::sync::Arc;

use anyhow::{Context, Result};

use berth_core::runtime::{ClientKind, RegistryError, RuntimeManager};
use berth_core::{RuntimeClient, RuntimeHost, SettingsSource};

/// Resolve `explicit` when given, otherwise whatever the settings select.
pub async fn resolve_with<K: ClientKind>(
    manager: &RuntimeManager<K>,
    settings: &dyn SettingsSource,
    explicit: Option<&str>,
) -> Result<Arc<K::Client>, RegistryError> {
    match explicit {
        Some(id) => manager.resolve(Some(id)).await,
        None => manager.resolve_configured(settings).await,
    }
}

/// Print the resolved client's id, display name and command.
pub async fn run_resolve(host: &RuntimeHost, orchestrator: bool, explicit: Option<&str>) -> Result<()> {
    let settings = host.settings().as_ref();
    let (id, display_name, command) = if orchestrator {
        let client = resolve_with(host.orchestrators(), settings, explicit)
            .await
            .context("failed to resolve orchestrator client")?;
        describe(client.as_ref())
    } else {
        let client = resolve_with(host.containers(), settings, explicit)
            .await
            .context("failed to resolve container client")?;
        describe(client.as_ref())
    };

    println!("{display_name} ({id})");
    println!("  command: {command}");
    Ok(())
}

/// Print only the resolved command name, for use in scripts.
pub async fn run_command(host: &RuntimeHost, orchestrator: bool) -> Result<()> {
    let command = if orchestrator {
        host.orchestrator_command()
            .await
            .context("failed to resolve orchestrator client")?
    } else {
        host.container_command()
            .await
            .context("failed to resolve container client")?
    };
    println!("{command}");
    Ok(())
}

fn describe<C: RuntimeClient + ?Sized>(client: &C) -> (String, String, String) {
    (
        client.id().to_string(),
        client.display_name().to_string(),
        client.command_name(),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use berth_core::ContainerClient;
    use berth_core::runtime::ContainerRuntimeManager;
    use berth_core::settings::keys;
    use berth_test_utils::FakeClient;

    use super::*;

    #[tokio::test]
    async fn explicit_id_beats_settings() {
        let manager = ContainerRuntimeManager::new();
        let a: Arc<dyn ContainerClient> = FakeClient::new("engineA", "enginea");
        let b: Arc<dyn ContainerClient> = FakeClient::new("engineB", "engineb");
        let _a = manager.register(a).unwrap();
        let _b = manager.register(b).unwrap();

        let mut settings = HashMap::new();
        settings.insert(keys::CONTAINER_CLIENT.to_string(), "engineA".to_string());

        let configured = resolve_with(&manager, &settings, None).await.unwrap();
        let explicit = resolve_with(&manager, &settings, Some("engineB")).await.unwrap();
        assert_eq!(configured.id(), "engineA");
        assert_eq!(explicit.id(), "engineB");
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_explicit_id_times_out() {
        let manager =
            ContainerRuntimeManager::new().with_registration_timeout(Duration::from_millis(20));

        let err = resolve_with(&manager, &HashMap::new(), Some("ghost"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no container client with ID 'ghost' is registered");
    }
}
