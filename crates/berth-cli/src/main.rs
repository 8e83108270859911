mod clients_cmd;
mod config;
mod resolve_cmd;
#[cfg(test)]
mod test_util;
mod use_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use berth_core::RuntimeHost;
use berth_core::settings::Settings;

use config::BerthConfig;

#[derive(Parser)]
#[command(name = "berth", about = "Container and orchestrator runtime client resolver")]
struct Cli {
    /// Config file path (overrides BERTH_CONFIG env var)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered container and orchestrator clients
    Clients {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Resolve the active client and show its command
    Resolve {
        /// Resolve an orchestrator instead of a container client
        #[arg(long)]
        orchestrator: bool,
        /// Resolve this client ID instead of the configured one
        #[arg(long)]
        client: Option<String>,
    },
    /// Print the command of the active client
    Command {
        /// Use the orchestrator client
        #[arg(long)]
        orchestrator: bool,
    },
    /// Set the preferred client in the config file
    Use {
        /// Client ID to prefer
        id: String,
        /// Set the preferred orchestrator instead of the container client
        #[arg(long)]
        orchestrator: bool,
    },
    /// Print a shell completion script
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "berth", &mut std::io::stdout());
        return Ok(());
    }

    let resolved = BerthConfig::resolve(cli.config.as_deref())?;
    tracing::debug!(
        path = %resolved.path.display(),
        providers = resolved.providers.len(),
        timeout_ms = resolved.registration_timeout.as_millis() as u64,
        "configuration resolved"
    );

    let settings = Arc::new(Settings::from_values(resolved.settings));
    let host = RuntimeHost::with_registration_timeout(settings, resolved.registration_timeout);
    host.activate()?;
    host.register_providers(resolved.providers);

    let result = match cli.command {
        Commands::Clients { json } => clients_cmd::run_clients(&host, json).await,
        Commands::Resolve {
            orchestrator,
            client,
        } => resolve_cmd::run_resolve(&host, orchestrator, client.as_deref()).await,
        Commands::Command { orchestrator } => resolve_cmd::run_command(&host, orchestrator).await,
        Commands::Use { id, orchestrator } => {
            use_cmd::run_use(&host, &resolved.path, &id, orchestrator).await
        }
        Commands::Completions { .. } => Ok(()),
    };

    host.deactivate().await;
    result
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("berth: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_config_flag_follows_subcommand() {
        let cli = Cli::try_parse_from(["berth", "resolve", "--orchestrator", "--config", "/tmp/b.toml"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/b.toml")));
        assert!(matches!(
            cli.command,
            Commands::Resolve {
                orchestrator: true,
                client: None
            }
        ));
    }

    #[test]
    fn use_requires_an_id() {
        assert!(Cli::try_parse_from(["berth", "use"]).is_err());
    }
}
