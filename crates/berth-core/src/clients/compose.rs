//! Docker Compose orchestrator client.
//!
//! Compose ships in two flavours: the v2 plugin (`docker compose ...`) and
//! the standalone v1 binary (`docker-compose ...`). Unless the user pins a
//! command through `containers.composeCommand`, the client probes for v2 the
//! first time it is resolved and remembers the answer until the setting
//! changes again.

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::client::{
    AutoConfigurable, CommandName, OrchestratorClient, RuntimeClient, SlowConfigurable,
};
use crate::settings::{SettingsSource, keys};

/// Upper bound on a single `docker compose version` probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Detects whether the compose v2 plugin is usable.
#[async_trait]
pub trait ComposeProbe: Send + Sync {
    async fn compose_v2_available(&self) -> Result<bool>;
}

/// Probes by running `docker compose version`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessComposeProbe;

#[async_trait]
impl ComposeProbe for ProcessComposeProbe {
    async fn compose_v2_available(&self) -> Result<bool> {
        let child = Command::new("docker")
            .args(["compose", "version"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            // No docker at all: certainly no compose v2.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e).context("failed to run docker compose version"),
        };

        match tokio::time::timeout(PROBE_TIMEOUT, child.wait()).await {
            Ok(status) => Ok(status
                .context("failed to wait on docker compose version")?
                .success()),
            Err(_elapsed) => {
                tracing::warn!(
                    timeout_secs = PROBE_TIMEOUT.as_secs(),
                    "docker compose version timed out; assuming compose v1"
                );
                Ok(false)
            }
        }
    }
}

/// The Docker Compose orchestrator.
pub struct DockerComposeClient {
    command: CommandName,
    compose_v2: AtomicBool,
    configured: AtomicBool,
    /// Bumped by every `reconfigure` so a probe that started earlier does not
    /// overwrite a newer explicit setting.
    generation: AtomicU64,
    probe_lock: Mutex<()>,
    probe: Arc<dyn ComposeProbe>,
}

impl DockerComposeClient {
    /// Well-known id; the orchestrator registry falls back to this client
    /// when no preference is configured.
    pub const CLIENT_ID: &'static str = "com.microsoft.visualstudio.orchestrators.dockercompose";
    pub const V2_COMMAND: &'static str = "docker";
    pub const V1_COMMAND: &'static str = "docker-compose";

    pub fn new(settings: &dyn SettingsSource) -> Self {
        Self::with_probe(settings, Arc::new(ProcessComposeProbe))
    }

    pub fn with_probe(settings: &dyn SettingsSource, probe: Arc<dyn ComposeProbe>) -> Self {
        let client = Self {
            command: CommandName::new(Self::V2_COMMAND),
            compose_v2: AtomicBool::new(true),
            configured: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            probe_lock: Mutex::new(()),
            probe,
        };
        client.reconfigure(settings);
        client
    }

    /// Whether `compose` must be passed as the first argument to the command.
    pub fn is_compose_v2(&self) -> bool {
        self.compose_v2.load(Ordering::Acquire)
    }

    /// Whether the command has been settled, either by setting or by probe.
    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    fn apply(&self, command: &str, compose_v2: bool) {
        self.command.set(command);
        self.compose_v2.store(compose_v2, Ordering::Release);
    }
}

impl RuntimeClient for DockerComposeClient {
    fn id(&self) -> &str {
        Self::CLIENT_ID
    }

    fn command_name(&self) -> String {
        self.command.get()
    }

    fn display_name(&self) -> &str {
        "Docker Compose"
    }

    fn description(&self) -> &str {
        "Use Docker Compose as the orchestrator"
    }

    fn as_auto_configurable(&self) -> Option<&dyn AutoConfigurable> {
        Some(self)
    }
}

impl OrchestratorClient for DockerComposeClient {
    fn as_slow_configurable(&self) -> Option<&dyn SlowConfigurable> {
        Some(self)
    }
}

impl AutoConfigurable for DockerComposeClient {
    fn reconfigure(&self, settings: &dyn SettingsSource) {
        self.generation.fetch_add(1, Ordering::AcqRel);

        match settings.get_non_empty(keys::COMPOSE_COMMAND) {
            Some(command) => {
                let command = command.trim();
                let words: Vec<&str> = command.split_whitespace().collect();
                if words == ["docker", "compose"] {
                    self.apply(Self::V2_COMMAND, true);
                } else {
                    self.apply(command, false);
                }
                self.configured.store(true, Ordering::Release);
                tracing::debug!(command, "compose command configured");
            }
            None => {
                // Back to the initial state; the next resolution probes again.
                self.apply(Self::V2_COMMAND, true);
                self.configured.store(false, Ordering::Release);
            }
        }
    }
}

#[async_trait]
impl SlowConfigurable for DockerComposeClient {
    async fn slow_configure(&self) -> Result<()> {
        if self.is_configured() {
            return Ok(());
        }

        let _guard = self.probe_lock.lock().await;
        loop {
            // Another caller, or a new setting, may have settled the command
            // while we waited.
            if self.is_configured() {
                return Ok(());
            }

            let generation = self.generation.load(Ordering::Acquire);
            let v2 = self.probe.compose_v2_available().await?;

            if self.generation.load(Ordering::Acquire) != generation {
                tracing::debug!("compose settings changed during probe; checking again");
                continue;
            }

            if v2 {
                self.apply(Self::V2_COMMAND, true);
            } else {
                self.apply(Self::V1_COMMAND, false);
            }
            self.configured.store(true, Ordering::Release);

            tracing::info!(
                command = %self.command_name(),
                compose_v2 = v2,
                "detected docker compose"
            );
            return Ok(());
        }
    }
}

impl std::fmt::Debug for DockerComposeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerComposeClient")
            .field("command", &self.command_name())
            .field("compose_v2", &self.is_compose_v2())
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use std::sync::atomic::AtomicUsize;

    struct FixedProbe {
        v2: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedProbe {
        fn new(v2: bool) -> Arc<Self> {
            Self::with_delay(v2, Duration::from_millis(10))
        }

        fn with_delay(v2: bool, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                v2,
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ComposeProbe for FixedProbe {
        async fn compose_v2_available(&self) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.v2)
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl ComposeProbe for FailingProbe {
        async fn compose_v2_available(&self) -> Result<bool> {
            anyhow::bail!("permission denied")
        }
    }

    #[tokio::test]
    async fn probes_once_and_picks_v1() {
        let probe = FixedProbe::new(false);
        let client = DockerComposeClient::with_probe(&Settings::new(), probe.clone());
        assert!(!client.is_configured());

        client.slow_configure().await.unwrap();
        client.slow_configure().await.unwrap();

        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.command_name(), "docker-compose");
        assert!(!client.is_compose_v2());
    }

    #[tokio::test]
    async fn concurrent_first_use_probes_once() {
        let probe = FixedProbe::new(true);
        let client = DockerComposeClient::with_probe(&Settings::new(), probe.clone());

        let (a, b) = tokio::join!(client.slow_configure(), client.slow_configure());
        a.unwrap();
        b.unwrap();

        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.command_name(), "docker");
        assert!(client.is_compose_v2());
    }

    #[tokio::test]
    async fn explicit_command_skips_probe() {
        let settings = Settings::new();
        settings.update(keys::COMPOSE_COMMAND, Some("podman-compose".to_string()));
        let probe = FixedProbe::new(true);
        let client = DockerComposeClient::with_probe(&settings, probe.clone());

        client.slow_configure().await.unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.command_name(), "podman-compose");
        assert!(!client.is_compose_v2());
    }

    #[test]
    fn docker_compose_setting_means_v2() {
        let settings = Settings::new();
        settings.update(keys::COMPOSE_COMMAND, Some("docker  compose".to_string()));
        let client = DockerComposeClient::with_probe(&settings, FixedProbe::new(false));
        assert!(client.is_configured());
        assert!(client.is_compose_v2());
        assert_eq!(client.command_name(), "docker");
    }

    #[tokio::test]
    async fn clearing_the_setting_reprobes() {
        let settings = Settings::new();
        settings.update(keys::COMPOSE_COMMAND, Some("docker-compose".to_string()));
        let probe = FixedProbe::new(true);
        let client = DockerComposeClient::with_probe(&settings, probe.clone());

        settings.update(keys::COMPOSE_COMMAND, None);
        client.reconfigure(&settings);
        assert!(!client.is_configured());

        client.slow_configure().await.unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.command_name(), "docker");
    }

    #[test]
    fn clearing_the_setting_restores_the_default_command() {
        let settings = Settings::new();
        settings.update(keys::COMPOSE_COMMAND, Some("podman-compose".to_string()));
        let client = DockerComposeClient::with_probe(&settings, FixedProbe::new(false));
        assert_eq!(client.command_name(), "podman-compose");

        settings.update(keys::COMPOSE_COMMAND, None);
        client.reconfigure(&settings);

        assert!(!client.is_configured());
        assert_eq!(client.command_name(), "docker");
        assert!(client.is_compose_v2());
    }

    #[tokio::test(start_paused = true)]
    async fn setting_set_and_cleared_during_detection_detects_again() {
        let settings = Settings::new();
        let probe = FixedProbe::with_delay(false, Duration::from_millis(100));
        let client = DockerComposeClient::with_probe(&settings, probe.clone());

        let flip = async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            settings.update(keys::COMPOSE_COMMAND, Some("podman-compose".to_string()));
            client.reconfigure(&settings);
            settings.update(keys::COMPOSE_COMMAND, None);
            client.reconfigure(&settings);
        };
        let (result, ()) = tokio::join!(client.slow_configure(), flip);
        result.unwrap();

        assert!(client.is_configured());
        assert_eq!(client.command_name(), "docker-compose");
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn setting_made_during_detection_wins() {
        let settings = Settings::new();
        let probe = FixedProbe::with_delay(true, Duration::from_millis(100));
        let client = DockerComposeClient::with_probe(&settings, probe.clone());

        let pin = async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            settings.update(keys::COMPOSE_COMMAND, Some("podman-compose".to_string()));
            client.reconfigure(&settings);
        };
        let (result, ()) = tokio::join!(client.slow_configure(), pin);
        result.unwrap();

        assert!(client.is_configured());
        assert_eq!(client.command_name(), "podman-compose");
        assert!(!client.is_compose_v2());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn probe_failure_leaves_client_unconfigured() {
        let client = DockerComposeClient::with_probe(&Settings::new(), Arc::new(FailingProbe));
        let err = client.slow_configure().await.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert!(!client.is_configured());
    }
}
