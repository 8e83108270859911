//! Shared test utilities for berth integration tests.
//!
//! Fake clients that can sit in either registry and record how they were
//! used, so tests can assert on reconfiguration and slow-configure calls
//! without touching a real engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use berth_core::client::{
    AutoConfigurable, CommandName, ContainerClient, OrchestratorClient, RuntimeClient,
    SlowConfigurable,
};
use berth_core::settings::SettingsSource;

/// A client whose command follows a caller-chosen setting key.
#[derive(Debug)]
pub struct FakeClient {
    id: String,
    default_command: String,
    command_key: Option<String>,
    command: CommandName,
    reconfigures: AtomicUsize,
}

impl FakeClient {
    pub fn new(id: &str, command: &str) -> Arc<Self> {
        Arc::new(Self::build(id, command, None))
    }

    /// A client that re-reads `key` on every `reconfigure`, falling back to
    /// `command` when the key is unset.
    pub fn following(id: &str, command: &str, key: &str) -> Arc<Self> {
        Arc::new(Self::build(id, command, Some(key.to_string())))
    }

    fn build(id: &str, command: &str, command_key: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            default_command: command.to_string(),
            command_key,
            command: CommandName::new(command),
            reconfigures: AtomicUsize::new(0),
        }
    }

    pub fn reconfigure_count(&self) -> usize {
        self.reconfigures.load(Ordering::SeqCst)
    }
}

impl RuntimeClient for FakeClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn command_name(&self) -> String {
        self.command.get()
    }

    fn display_name(&self) -> &str {
        &self.id
    }

    fn as_auto_configurable(&self) -> Option<&dyn AutoConfigurable> {
        self.command_key.as_ref().map(|_| self as &dyn AutoConfigurable)
    }
}

impl ContainerClient for FakeClient {}
impl OrchestratorClient for FakeClient {}

impl AutoConfigurable for FakeClient {
    fn reconfigure(&self, settings: &dyn SettingsSource) {
        self.reconfigures.fetch_add(1, Ordering::SeqCst);
        let command = self
            .command_key
            .as_deref()
            .and_then(|key| settings.get_non_empty(key))
            .unwrap_or_else(|| self.default_command.clone());
        self.command.set(command);
    }
}

/// An orchestrator that needs slow, one-time setup.
#[derive(Debug)]
pub struct SlowClient {
    id: String,
    delay: Duration,
    fail: bool,
    command: CommandName,
    setups: AtomicUsize,
    configured: tokio::sync::Mutex<bool>,
}

impl SlowClient {
    /// Setup sleeps for `delay`, then switches the command to
    /// `<command>-ready`.
    pub fn new(id: &str, command: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            delay,
            fail: false,
            command: CommandName::new(command),
            setups: AtomicUsize::new(0),
            configured: tokio::sync::Mutex::new(false),
        })
    }

    /// A client whose setup always fails.
    pub fn failing(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            delay: Duration::ZERO,
            fail: true,
            command: CommandName::new(id),
            setups: AtomicUsize::new(0),
            configured: tokio::sync::Mutex::new(false),
        })
    }

    /// How many times the expensive part actually ran.
    pub fn setup_count(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }
}

impl RuntimeClient for SlowClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn command_name(&self) -> String {
        self.command.get()
    }

    fn display_name(&self) -> &str {
        &self.id
    }
}

impl OrchestratorClient for SlowClient {
    fn as_slow_configurable(&self) -> Option<&dyn SlowConfigurable> {
        Some(self)
    }
}

#[async_trait]
impl SlowConfigurable for SlowClient {
    async fn slow_configure(&self) -> Result<()> {
        let mut configured = self.configured.lock().await;
        if *configured {
            return Ok(());
        }

        self.setups.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            anyhow::bail!("{} could not be configured", self.id);
        }

        let ready = format!("{}-ready", self.command.get());
        self.command.set(ready);
        *configured = true;
        Ok(())
    }
}
