//! `amas providers`: the resolved provider list in dispatch order.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;

use amas_core::llm::registry::ProviderRegistry;
use amas_infra::llm::build_registry;
use amas_types::llm::ProviderConfig;

use crate::state::AppState;

#[derive(Serialize)]
struct ProviderRow<'a> {
    id: &'a str,
    display_name: &'a str,
    family: String,
    model_id: &'a str,
    base_url: &'a str,
    priority: i32,
    max_tokens: u32,
    timeout_seconds: u64,
    configured: bool,
}

impl<'a> From<&'a ProviderConfig> for ProviderRow<'a> {
    fn from(config: &'a ProviderConfig) -> Self {
        Self {
            id: &config.id,
            display_name: &config.display_name,
            family: config.request_family.to_string(),
            model_id: &config.model_id,
            base_url: &config.base_url,
            priority: config.priority,
            max_tokens: config.max_tokens,
            timeout_seconds: config.timeout_seconds,
            configured: config.has_api_key(),
        }
    }
}

/// Rows in the order the dispatcher will try the providers.
fn dispatch_rows(registry: &ProviderRegistry) -> Vec<ProviderRow<'_>> {
    registry
        .list_providers()
        .into_iter()
        .map(ProviderRow::from)
        .collect()
}

pub fn list_providers(state: &AppState, json: bool) -> Result<()> {
    let registry = build_registry(state.providers()?)?;
    let rows = dispatch_rows(&registry);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!();
        println!(
            "  {} No providers enabled. Check {}.",
            style("i").blue().bold(),
            style(config_hint(state)).cyan()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("  {}", style("Providers (dispatch order)").bold());
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Priority").fg(Color::White),
        Cell::new("Provider").fg(Color::White),
        Cell::new("Family").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Timeout").fg(Color::White),
        Cell::new("Key").fg(Color::White),
    ]);

    for row in &rows {
        let key_cell = if row.configured {
            Cell::new("set").fg(Color::Green)
        } else {
            Cell::new("missing").fg(Color::DarkGrey)
        };

        table.add_row(vec![
            Cell::new(row.priority).fg(Color::Cyan),
            Cell::new(format!("{} ({})", row.display_name, row.id)).fg(Color::White),
            Cell::new(&row.family).fg(Color::DarkGrey),
            Cell::new(super::truncate(row.model_id, 40)).fg(Color::DarkGrey),
            Cell::new(format!("{}s", row.timeout_seconds)).fg(Color::White),
            key_cell,
        ]);
    }

    let usable = rows.iter().filter(|r| r.configured).count();
    println!("{table}");
    println!();
    println!(
        "  {} of {} provider{} have an API key",
        style(usable).bold(),
        rows.len(),
        if rows.len() == 1 { "" } else { "s" }
    );
    println!(
        "  {}",
        style("Keys are read from <ID>_API_KEY unless the config sets api_key_env.").dim()
    );
    println!();

    Ok(())
}

fn config_hint(state: &AppState) -> String {
    state
        .config_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "the config file".to_string())
}
