//! Runtime client registry and resolver.
//!
//! A [`RuntimeManager`] owns every client registered for one [`ClientKind`]
//! and answers "which client should I use right now?" even while clients are
//! still registering.
//!
//! # Resolution
//!
//! ```text
//! resolve(None)      --> K::default_client(list()) --> K::prepare --> client
//! resolve(Some(id))  --> registered?  yes --------------> K::prepare --> client
//!                                     no  --> subscribe to registrations
//!                                             re-check the map
//!                                             wait <= registration_timeout
//!                                               |-- matching registration --> K::prepare --> client
//!                                               `-- deadline --> ClientNotRegistered
//! ```

mod error;
mod kinds;

pub use error::RegistryError;
pub use kinds::{ContainerRuntimeManager, Containers, OrchestratorRuntimeManager, Orchestrators};

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::client::RuntimeClient;
use crate::disposable::Disposable;
use crate::settings::SettingsSource;

/// How long `resolve` waits for a preferred client that has not registered
/// yet.
pub const DEFAULT_REGISTRATION_TIMEOUT: Duration = Duration::from_millis(1000);

const REGISTRATION_CHANNEL_CAPACITY: usize = 64;

/// The per-registry policy: what kind of client is held, which setting names
/// the preferred one, how to pick a default, and what must happen before a
/// resolved client is handed out.
#[async_trait]
pub trait ClientKind: Send + Sync + 'static {
    /// Trait object type stored in the registry.
    type Client: RuntimeClient + ?Sized;

    /// Noun used in log lines and error messages ("container").
    const NOUN: &'static str;

    /// Setting key holding the preferred client id.
    const SETTING: &'static str;

    /// Pick a client when no preference is configured.
    fn default_client(clients: &[Arc<Self::Client>]) -> Option<Arc<Self::Client>>;

    /// Runs on every resolved client before it is returned.
    async fn prepare(_client: &Self::Client) -> anyhow::Result<()> {
        Ok(())
    }
}

type ClientMap<C> = HashMap<String, Arc<C>>;

/// Registry of runtime clients for one [`ClientKind`].
pub struct RuntimeManager<K: ClientKind> {
    clients: Arc<Mutex<ClientMap<K::Client>>>,
    registered: broadcast::Sender<Arc<K::Client>>,
    registration_timeout: Duration,
    _kind: PhantomData<K>,
}

impl<K: ClientKind> Default for RuntimeManager<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ClientKind> RuntimeManager<K> {
    /// Create an empty registry using [`DEFAULT_REGISTRATION_TIMEOUT`].
    pub fn new() -> Self {
        let (registered, _) = broadcast::channel(REGISTRATION_CHANNEL_CAPACITY);
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            registered,
            registration_timeout: DEFAULT_REGISTRATION_TIMEOUT,
            _kind: PhantomData,
        }
    }

    /// Override how long `resolve` waits for a late registration.
    pub fn with_registration_timeout(mut self, timeout: Duration) -> Self {
        self.registration_timeout = timeout;
        self
    }

    pub fn registration_timeout(&self) -> Duration {
        self.registration_timeout
    }

    /// Register a client.
    ///
    /// The client is visible to lookups and pending waiters before this
    /// returns. The returned handle removes this registration; disposing it
    /// more than once has no further effect.
    ///
    /// Fails without touching the registry if the id is empty or already
    /// taken.
    pub fn register(&self, client: Arc<K::Client>) -> Result<Disposable, RegistryError> {
        let id = client.id().to_string();
        if id.is_empty() {
            return Err(RegistryError::InvalidClient);
        }

        match self.lock().entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(RegistryError::DuplicateClient { kind: K::NOUN, id });
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&client));
            }
        }

        tracing::debug!(kind = K::NOUN, client_id = %id, "registered runtime client");

        // Nobody listening is fine.
        let _ = self.registered.send(Arc::clone(&client));

        let clients = Arc::downgrade(&self.clients);
        Ok(Disposable::new(move || {
            let Some(clients) = clients.upgrade() else {
                return;
            };
            let mut clients = clients.lock().unwrap_or_else(PoisonError::into_inner);
            // Only remove the entry this handle created.
            if clients
                .get(&id)
                .is_some_and(|current| Arc::ptr_eq(current, &client))
            {
                clients.remove(&id);
                tracing::debug!(kind = K::NOUN, client_id = %id, "unregistered runtime client");
            }
        }))
    }

    /// Snapshot of the registered clients, in no particular order.
    pub fn list(&self) -> Vec<Arc<K::Client>> {
        self.lock().values().cloned().collect()
    }

    /// Look up a client without waiting.
    pub fn get(&self, id: &str) -> Option<Arc<K::Client>> {
        self.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Subscribe to registrations made after this call.
    pub fn on_client_registered(&self) -> broadcast::Receiver<Arc<K::Client>> {
        self.registered.subscribe()
    }

    /// Stream of clients registered after this call.
    ///
    /// Notifications dropped because the consumer fell behind are skipped.
    pub fn registrations(&self) -> impl Stream<Item = Arc<K::Client>> + Send + use<K> {
        BroadcastStream::new(self.registered.subscribe())
            .filter_map(|event| futures::future::ready(event.ok()))
    }

    /// Resolve the client to use.
    ///
    /// With no (or an empty) preferred id the kind's default policy picks
    /// the client. A preferred id that is not registered yet is waited for
    /// up to the registration timeout.
    pub async fn resolve(&self, preferred_id: Option<&str>) -> Result<Arc<K::Client>, RegistryError> {
        let client = match preferred_id.filter(|id| !id.is_empty()) {
            None => K::default_client(&self.list())
                .ok_or(RegistryError::NoClientConfigured { kind: K::NOUN })?,
            Some(id) => self.wait_for_client(id).await?,
        };

        K::prepare(client.as_ref())
            .await
            .map_err(|source| RegistryError::Configure {
                kind: K::NOUN,
                id: client.id().to_string(),
                source,
            })?;

        Ok(client)
    }

    /// The resolved client's command name, read at call time.
    pub async fn get_command(&self, preferred_id: Option<&str>) -> Result<String, RegistryError> {
        Ok(self.resolve(preferred_id).await?.command_name())
    }

    /// Resolve using the preferred id currently stored under
    /// [`ClientKind::SETTING`]. The setting is read on every call.
    pub async fn resolve_configured(
        &self,
        settings: &dyn SettingsSource,
    ) -> Result<Arc<K::Client>, RegistryError> {
        let preferred = settings.get_non_empty(K::SETTING);
        self.resolve(preferred.as_deref()).await
    }

    /// Command name of the client selected by [`ClientKind::SETTING`].
    pub async fn configured_command(
        &self,
        settings: &dyn SettingsSource,
    ) -> Result<String, RegistryError> {
        Ok(self.resolve_configured(settings).await?.command_name())
    }

    async fn wait_for_client(&self, id: &str) -> Result<Arc<K::Client>, RegistryError> {
        if let Some(client) = self.get(id) {
            return Ok(client);
        }

        // Subscribe before the second check so a registration landing in
        // between cannot be missed.
        let mut registered = self.registered.subscribe();
        if let Some(client) = self.get(id) {
            return Ok(client);
        }

        tracing::debug!(
            kind = K::NOUN,
            client_id = id,
            timeout_ms = self.registration_timeout.as_millis() as u64,
            "waiting for runtime client to register"
        );

        let wait = async {
            loop {
                match registered.recv().await {
                    Ok(client) if client.id() == id => return Some(client),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(kind = K::NOUN, skipped, "registration waiter lagged");
                        if let Some(client) = self.get(id) {
                            return Some(client);
                        }
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        };

        match tokio::time::timeout(self.registration_timeout, wait).await {
            Ok(Some(client)) => Ok(client),
            Ok(None) | Err(_) => {
                tracing::warn!(
                    kind = K::NOUN,
                    client_id = id,
                    "runtime client did not register before the deadline"
                );
                Err(RegistryError::ClientNotRegistered {
                    kind: K::NOUN,
                    id: id.to_string(),
                })
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClientMap<K::Client>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: ClientKind> fmt::Debug for RuntimeManager<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeManager")
            .field("kind", &K::NOUN)
            .field("clients", &self.lock().keys().collect::<Vec<_>>())
            .field("registration_timeout", &self.registration_timeout)
            .finish()
    }
}
