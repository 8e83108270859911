//! `berth use` command: persist the preferred client in the config file.

use std::path::Path;

use anyhow::{Result, bail};

use berth_core::RuntimeHost;

use crate::config;

/// Check `id` against the registered clients, then write it to the config
/// file at `path`.
pub async fn run_use(host: &RuntimeHost, path: &Path, id: &str, orchestrator: bool) -> Result<()> {
    host.wait_for_providers().await;

    let (noun, known) = if orchestrator {
        ("orchestrator", host.orchestrators().contains(id))
    } else {
        ("container", host.containers().contains(id))
    };
    if !known {
        bail!("no {noun} client with ID '{id}' is registered; run `berth clients` to list them");
    }

    set_preferred(path, id, orchestrator)?;
    println!("Preferred {noun} client set to {id}");
    println!("  written to {}", path.display());
    Ok(())
}

/// Update the preferred-client entry in the config file, keeping every
/// other entry as it was.
pub fn set_preferred(path: &Path, id: &str, orchestrator: bool) -> Result<()> {
    let mut file = config::load_config(path)?;
    let slot = if orchestrator {
        &mut file.containers.orchestrator_client
    } else {
        &mut file.containers.container_client
    };
    *slot = Some(id.to_string());
    config::save_config(path, &file)
}
