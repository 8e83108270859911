//! Configuration source consumed by the registries and clients.
//!
//! [`Settings`] is a flat, dotted-key store (`containers.containerClient`)
//! that broadcasts a [`ConfigurationChange`] whenever a value actually
//! changes. Readers go through the [`SettingsSource`] trait so tests can hand
//! in a plain `HashMap`.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

/// Well-known setting keys.
pub mod keys {
    /// Section every key below lives in.
    pub const SECTION: &str = "containers";
    /// Preferred container client id.
    pub const CONTAINER_CLIENT: &str = "containers.containerClient";
    /// Preferred orchestrator client id.
    pub const ORCHESTRATOR_CLIENT: &str = "containers.orchestratorClient";
    /// Command override for container engines.
    pub const CONTAINER_COMMAND: &str = "containers.containerCommand";
    /// Command override for the compose orchestrator.
    pub const COMPOSE_COMMAND: &str = "containers.composeCommand";
}

const CHANGE_CHANNEL_CAPACITY: usize = 32;

/// Read access to configuration values.
pub trait SettingsSource: Send + Sync {
    /// Returns the raw value for `key`, if set.
    fn get(&self, key: &str) -> Option<String>;

    /// Like [`get`](SettingsSource::get) but treats an empty value as unset.
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }
}

impl SettingsSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// A set of keys whose values changed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationChange {
    keys: BTreeSet<String>,
}

impl ConfigurationChange {
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if `section` or any key nested under it changed.
    ///
    /// `affects("containers")` matches `containers.containerCommand`, but
    /// `affects("containers.container")` does not match
    /// `containers.containerCommand`.
    pub fn affects(&self, section: &str) -> bool {
        self.keys.iter().any(|key| {
            key == section
                || key
                    .strip_prefix(section)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

/// In-memory settings store with change notifications.
#[derive(Debug)]
pub struct Settings {
    values: RwLock<HashMap<String, String>>,
    changed: broadcast::Sender<ConfigurationChange>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::from_values(HashMap::new())
    }

    pub fn from_values(values: HashMap<String, String>) -> Self {
        let (changed, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: RwLock::new(values),
            changed,
        }
    }

    /// Subscribe to configuration changes made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigurationChange> {
        self.changed.subscribe()
    }

    /// Set (`Some`) or clear (`None`) a single key.
    ///
    /// Returns `true` and notifies subscribers only if the stored value
    /// changed.
    pub fn update(&self, key: &str, value: Option<String>) -> bool {
        let changed = {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            match value {
                Some(value) => values.insert(key.to_string(), value.clone()) != Some(value),
                None => values.remove(key).is_some(),
            }
        };

        if changed {
            tracing::debug!(key, "setting changed");
            self.notify(ConfigurationChange::new([key]));
        }
        changed
    }

    /// Replace every value at once (e.g. after re-reading the config file),
    /// notifying subscribers of the keys that differ.
    pub fn replace_all(&self, next: HashMap<String, String>) -> Option<ConfigurationChange> {
        let changed: BTreeSet<String> = {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            let changed = values
                .keys()
                .chain(next.keys())
                .filter(|key| values.get(*key) != next.get(*key))
                .cloned()
                .collect();
            *values = next;
            changed
        };

        if changed.is_empty() {
            return None;
        }

        let change = ConfigurationChange { keys: changed };
        tracing::debug!(keys = ?change.keys, "settings replaced");
        self.notify(change.clone());
        Some(change)
    }

    /// Snapshot of every stored value.
    pub fn values(&self) -> HashMap<String, String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn notify(&self, change: ConfigurationChange) {
        // No subscribers is not an error.
        let _ = self.changed.send(change);
    }
}

impl SettingsSource for Settings {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affects_matches_sections_and_exact_keys() {
        let change = ConfigurationChange::new([keys::CONTAINER_COMMAND]);
        assert!(change.affects(keys::CONTAINER_COMMAND));
        assert!(change.affects(keys::SECTION));
        assert!(!change.affects("containers.container"));
        assert!(!change.affects(keys::COMPOSE_COMMAND));
    }

    #[test]
    fn get_non_empty_skips_blank_values() {
        let settings = Settings::new();
        settings.update(keys::CONTAINER_CLIENT, Some("  ".to_string()));
        assert_eq!(settings.get(keys::CONTAINER_CLIENT).as_deref(), Some("  "));
        assert!(settings.get_non_empty(keys::CONTAINER_CLIENT).is_none());
    }

    #[tokio::test]
    async fn update_notifies_only_on_change() {
        let settings = Settings::new();
        let mut rx = settings.subscribe();

        assert!(settings.update(keys::CONTAINER_COMMAND, Some("podman".to_string())));
        assert!(!settings.update(keys::CONTAINER_COMMAND, Some("podman".to_string())));
        assert!(settings.update(keys::CONTAINER_COMMAND, None));
        assert!(!settings.update(keys::CONTAINER_COMMAND, None));

        let first = rx.recv().await.unwrap();
        assert!(first.affects(keys::CONTAINER_COMMAND));
        let second = rx.recv().await.unwrap();
        assert!(second.affects(keys::CONTAINER_COMMAND));
        assert!(rx.try_recv().is_err());
        assert!(settings.get(keys::CONTAINER_COMMAND).is_none());
    }

    #[tokio::test]
    async fn replace_all_reports_changed_keys() {
        let settings = Settings::from_values(HashMap::from([
            (keys::CONTAINER_COMMAND.to_string(), "docker".to_string()),
            (keys::COMPOSE_COMMAND.to_string(), "docker-compose".to_string()),
        ]));
        let mut rx = settings.subscribe();

        let change = settings
            .replace_all(HashMap::from([
                (keys::CONTAINER_COMMAND.to_string(), "docker".to_string()),
                (keys::CONTAINER_CLIENT.to_string(), "x".to_string()),
            ]))
            .expect("values differ");

        let changed: Vec<&str> = change.keys().collect();
        assert_eq!(changed, vec![keys::COMPOSE_COMMAND, keys::CONTAINER_CLIENT]);
        assert_eq!(rx.recv().await.unwrap(), change);

        assert!(settings.replace_all(settings.values()).is_none());
    }
}
