//! Engine-agnostic registry and resolver for container and orchestrator
//! runtime clients.
//!
//! Clients register with a [`RuntimeManager`](runtime::RuntimeManager) at any
//! point after startup; callers ask for "the configured client" and get it
//! even if its registration is still in flight.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use berth_core::host::RuntimeHost;
//! use berth_core::settings::Settings;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let host = RuntimeHost::new(Arc::new(Settings::new()));
//! host.activate()?;
//! let docker = host.container_command().await?;
//! println!("using {docker}");
//! host.deactivate().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod clients;
pub mod disposable;
pub mod host;
pub mod provider;
pub mod runtime;
pub mod settings;

pub use client::{AutoConfigurable, ContainerClient, OrchestratorClient, RuntimeClient, SlowConfigurable};
pub use disposable::{Disposable, DisposableStore};
pub use host::RuntimeHost;
pub use runtime::{
    ClientKind, ContainerRuntimeManager, OrchestratorRuntimeManager, RegistryError, RuntimeManager,
};
pub use settings::{Settings, SettingsSource};
