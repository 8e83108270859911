//! Composition root: owns the registries, registers the built-in clients and
//! keeps them in step with configuration.
//!
//! ```text
//! RuntimeHost
//!   ├── Settings ──changes──> configuration listener ──reconfigure()──> clients
//!   ├── ContainerRuntimeManager     (docker, podman, container providers)
//!   ├── OrchestratorRuntimeManager  (docker compose, orchestrator providers)
//!   └── DisposableStore             (every registration, torn down on deactivate)
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::RuntimeClient;
use crate::clients::{DockerClient, DockerComposeClient, PodmanClient};
use crate::disposable::DisposableStore;
use crate::provider::{ProviderKind, ProviderSpec};
use crate::runtime::{
    ClientKind, ContainerRuntimeManager, DEFAULT_REGISTRATION_TIMEOUT, OrchestratorRuntimeManager,
    RegistryError, RuntimeManager,
};
use crate::settings::{ConfigurationChange, Settings, SettingsSource, keys};

/// Owns both registries for the lifetime of the process.
pub struct RuntimeHost {
    settings: Arc<Settings>,
    containers: Arc<ContainerRuntimeManager>,
    orchestrators: Arc<OrchestratorRuntimeManager>,
    subscriptions: Arc<DisposableStore>,
    /// Replaced by `activate` once a previous `deactivate` has cancelled it.
    cancel: Mutex<CancellationToken>,
    listener: Mutex<Option<JoinHandle<()>>>,
    providers: Mutex<Vec<JoinHandle<()>>>,
}

impl RuntimeHost {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self::with_registration_timeout(settings, DEFAULT_REGISTRATION_TIMEOUT)
    }

    pub fn with_registration_timeout(settings: Arc<Settings>, timeout: Duration) -> Self {
        Self {
            settings,
            containers: Arc::new(ContainerRuntimeManager::new().with_registration_timeout(timeout)),
            orchestrators: Arc::new(
                OrchestratorRuntimeManager::new().with_registration_timeout(timeout),
            ),
            subscriptions: Arc::new(DisposableStore::new()),
            cancel: Mutex::new(CancellationToken::new()),
            listener: Mutex::new(None),
            providers: Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn containers(&self) -> &Arc<ContainerRuntimeManager> {
        &self.containers
    }

    pub fn orchestrators(&self) -> &Arc<OrchestratorRuntimeManager> {
        &self.orchestrators
    }

    /// Register the built-in clients and start following configuration
    /// changes. Must be called from within a tokio runtime.
    /// Calling it again after [`deactivate`](Self::deactivate) starts a
    /// fresh session.
    pub fn activate(&self) -> Result<(), RegistryError> {
        let settings = self.settings.as_ref();
        let cancel = {
            let mut cancel = self.lock_cancel();
            if cancel.is_cancelled() {
                *cancel = CancellationToken::new();
            }
            cancel.clone()
        };

        self.subscriptions
            .push(self.containers.register(Arc::new(DockerClient::new(settings)))?);
        self.subscriptions
            .push(self.containers.register(Arc::new(PodmanClient::new(settings)))?);
        self.subscriptions
            .push(self.orchestrators.register(Arc::new(DockerComposeClient::new(settings)))?);

        // Subscribe before returning so no change made after activation is
        // missed by the listener.
        let changes = self.settings.subscribe();
        let listener = tokio::spawn(watch_configuration(
            changes,
            Arc::clone(&self.settings),
            Arc::clone(&self.containers),
            Arc::clone(&self.orchestrators),
            cancel,
        ));
        if let Some(previous) = self.lock_listener().replace(listener) {
            previous.abort();
        }

        tracing::info!(
            containers = self.containers.len(),
            orchestrators = self.orchestrators.len(),
            "runtime host activated"
        );
        Ok(())
    }

    /// Register provider clients in the background, each after its declared
    /// activation delay, the way separately loaded extensions show up late.
    pub fn register_providers(&self, specs: impl IntoIterator<Item = ProviderSpec>) {
        let token = self.lock_cancel().clone();
        let mut providers = self.providers.lock().unwrap_or_else(PoisonError::into_inner);
        for spec in specs {
            let containers = Arc::clone(&self.containers);
            let orchestrators = Arc::clone(&self.orchestrators);
            let subscriptions = Arc::clone(&self.subscriptions);
            let cancel = token.clone();

            providers.push(tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(spec.activation_delay()) => {}
                }

                let client = spec.to_client();
                let registered = match spec.kind {
                    ProviderKind::Container => containers.register(client),
                    ProviderKind::Orchestrator => orchestrators.register(client),
                };
                match registered {
                    Ok(handle) => {
                        tracing::debug!(provider = %spec.id, kind = %spec.kind, "provider registered");
                        subscriptions.push(handle);
                    }
                    Err(e) => {
                        tracing::error!(provider = %spec.id, kind = %spec.kind, error = %e, "failed to register provider");
                    }
                }
            }));
        }
    }

    /// Wait until every provider scheduled so far has registered (or failed).
    pub async fn wait_for_providers(&self) {
        let pending = std::mem::take(
            &mut *self.providers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for task in pending {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "provider registration task failed");
            }
        }
    }

    /// Command of the container client selected by configuration.
    pub async fn container_command(&self) -> Result<String, RegistryError> {
        self.containers.configured_command(self.settings.as_ref()).await
    }

    /// Command of the orchestrator client selected by configuration.
    pub async fn orchestrator_command(&self) -> Result<String, RegistryError> {
        self.orchestrators
            .configured_command(self.settings.as_ref())
            .await
    }

    /// Stop the listener and pending providers, then drop every registration.
    pub async fn deactivate(&self) {
        self.lock_cancel().cancel();

        let listener = self.lock_listener().take();
        if let Some(listener) = listener {
            if let Err(e) = listener.await {
                tracing::warn!(error = %e, "configuration listener failed");
            }
        }
        self.wait_for_providers().await;

        self.subscriptions.dispose_all();
        tracing::info!("runtime host deactivated");
    }

    fn lock_cancel(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listener(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RuntimeHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHost")
            .field("containers", &self.containers)
            .field("orchestrators", &self.orchestrators)
            .field("active", &!self.lock_cancel().is_cancelled())
            .finish()
    }
}

async fn watch_configuration(
    mut changes: broadcast::Receiver<ConfigurationChange>,
    settings: Arc<Settings>,
    containers: Arc<ContainerRuntimeManager>,
    orchestrators: Arc<OrchestratorRuntimeManager>,
    cancel: CancellationToken,
) {
    loop {
        let change = tokio::select! {
            _ = cancel.cancelled() => break,
            change = changes.recv() => change,
        };

        match change {
            Ok(change) => {
                if change.affects(keys::CONTAINER_COMMAND) {
                    reconfigure_all(&containers, settings.as_ref());
                }
                if change.affects(keys::COMPOSE_COMMAND) {
                    reconfigure_all(&orchestrators, settings.as_ref());
                }
                for key in [keys::CONTAINER_CLIENT, keys::ORCHESTRATOR_CLIENT] {
                    if change.affects(key) {
                        tracing::info!(
                            setting = key,
                            value = settings.get(key).as_deref().unwrap_or(""),
                            "preferred client changed"
                        );
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                // We no longer know what changed; bring everything up to date.
                tracing::debug!(skipped, "configuration listener lagged");
                reconfigure_all(&containers, settings.as_ref());
                reconfigure_all(&orchestrators, settings.as_ref());
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Call `reconfigure` on every registered client that supports it.
fn reconfigure_all<K: ClientKind>(manager: &RuntimeManager<K>, settings: &dyn SettingsSource) -> usize {
    let mut count = 0;
    for client in manager.list() {
        if let Some(configurable) = client.as_auto_configurable() {
            configurable.reconfigure(settings);
            count += 1;
        }
    }
    tracing::debug!(kind = K::NOUN, count, "reconfigured runtime clients");
    count
}
