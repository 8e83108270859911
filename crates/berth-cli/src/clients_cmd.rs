//! `berth clients` command: list every registered client of both kinds.

use anyhow::{Context, Result};
use serde::Serialize;

use berth_core::runtime::{ClientKind, RuntimeManager};
use berth_core::{RuntimeClient, RuntimeHost, SettingsSource};

/// One line of `berth clients` output.
#[derive(Debug, Serialize)]
pub struct ClientRow {
    pub kind: &'static str,
    pub id: String,
    pub display_name: String,
    pub command: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Whether this client is the one `resolve` would pick right now.
    pub selected: bool,
}

/// Run the clients command.
pub async fn run_clients(host: &RuntimeHost, json: bool) -> Result<()> {
    host.wait_for_providers().await;

    let settings = host.settings().as_ref();
    let mut rows = collect_rows(host.containers(), settings);
    rows.extend(collect_rows(host.orchestrators(), settings));

    if json {
        let out = serde_json::to_string_pretty(&rows).context("failed to serialize clients")?;
        println!("{out}");
        return Ok(());
    }

    print!("{}", render_table(&rows));
    for (noun, key) in [
        ("container", berth_core::settings::keys::CONTAINER_CLIENT),
        ("orchestrator", berth_core::settings::keys::ORCHESTRATOR_CLIENT),
    ] {
        if let Some(id) = settings.get_non_empty(key) {
            if !rows.iter().any(|r| r.kind == noun && r.id == id) {
                eprintln!("warning: configured {noun} client '{id}' is not registered");
            }
        }
    }
    Ok(())
}

/// Snapshot one registry, marking the client selected by configuration or,
/// failing that, by the kind's default policy. Sorted by id.
pub fn collect_rows<K: ClientKind>(
    manager: &RuntimeManager<K>,
    settings: &dyn SettingsSource,
) -> Vec<ClientRow> {
    let clients = manager.list();
    let selected = settings
        .get_non_empty(K::SETTING)
        .or_else(|| K::default_client(&clients).map(|c| c.id().to_string()));

    let mut rows: Vec<ClientRow> = clients
        .iter()
        .map(|client| ClientRow {
            kind: K::NOUN,
            id: client.id().to_string(),
            display_name: client.display_name().to_string(),
            command: client.command_name(),
            description: client.description().to_string(),
            selected: selected.as_deref() == Some(client.id()),
        })
        .collect();
    rows.sort_by(|a, b| a.id.cmp(&b.id));
    rows
}

/// Plain-text listing grouped by kind; `*` marks the selected client.
pub fn render_table(rows: &[ClientRow]) -> String {
    let id_width = rows.iter().map(|r| r.id.len()).max().unwrap_or(0);
    let name_width = rows.iter().map(|r| r.display_name.len()).max().unwrap_or(0);

    let mut out = String::new();
    let mut current_kind = None;
    for row in rows {
        if current_kind != Some(row.kind) {
            if current_kind.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("{} clients:\n", capitalize(row.kind)));
            current_kind = Some(row.kind);
        }
        let marker = if row.selected { '*' } else { ' ' };
        out.push_str(&format!(
            "  {marker} {:<id_width$}  {:<name_width$}  {}\n",
            row.id, row.display_name, row.command
        ));
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
