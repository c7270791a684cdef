//! `amas bench`: drive the dispatcher with concurrent calls, then report
//! per-provider statistics.

use std::time::Instant;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use futures_util::StreamExt;
use futures_util::stream;
use serde::Serialize;

use amas_types::llm::{GenerateRequest, Message};
use amas_types::stats::{ProviderStats, StatsSnapshot};

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct BenchReport {
    requests: usize,
    succeeded: usize,
    failed: usize,
    elapsed_ms: u64,
    stats: StatsSnapshot,
}

pub async fn bench(
    state: &AppState,
    requests: usize,
    concurrency: usize,
    prompt: &str,
    json: bool,
) -> Result<()> {
    if requests == 0 {
        bail!("--requests must be at least 1");
    }
    let dispatcher = state.dispatcher()?;
    let request = GenerateRequest::new(vec![Message::user(prompt)]);

    tracing::info!(requests, concurrency, "Starting bench run");
    let started = Instant::now();
    let succeeded = stream::iter(0..requests)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let request = request.clone();
            async move { dispatcher.generate(&request).await.success }
        })
        .buffer_unordered(concurrency.max(1))
        .filter(|success| std::future::ready(*success))
        .count()
        .await;

    let report = BenchReport {
        requests,
        succeeded,
        failed: requests - succeeded,
        elapsed_ms: started.elapsed().as_millis() as u64,
        stats: dispatcher.get_stats(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &BenchReport) {
    let stats = &report.stats;

    println!();
    println!(
        "  {} {} of {} calls succeeded in {}ms",
        style("Bench").bold(),
        style(report.succeeded).green().bold(),
        report.requests,
        report.elapsed_ms
    );
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Provider").fg(Color::White),
        Cell::new("Health").fg(Color::White),
        Cell::new("Calls").fg(Color::White),
        Cell::new("OK").fg(Color::White),
        Cell::new("Failed").fg(Color::White),
        Cell::new("Avg ms").fg(Color::White),
        Cell::new("Last OK").fg(Color::White),
        Cell::new("Last Error").fg(Color::White),
    ]);

    let mut providers: Vec<&ProviderStats> = stats.per_provider.values().collect();
    providers.sort_by_key(|p| p.priority);

    let now = Utc::now();
    for provider in providers {
        table.add_row(vec![
            Cell::new(&provider.display_name).fg(Color::White),
            health_cell(provider),
            Cell::new(provider.total_calls).fg(Color::White),
            Cell::new(provider.success_count).fg(Color::Green),
            Cell::new(provider.failure_count).fg(Color::Red),
            Cell::new(format!("{:.0}", provider.avg_response_time_ms)).fg(Color::White),
            Cell::new(ago(provider.last_success_at, now)).fg(Color::DarkGrey),
            Cell::new(super::truncate(provider.last_error.as_deref().unwrap_or("-"), 40))
                .fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
    println!();
    println!(
        "  {} healthy of {} · {} calls · {:.1}% success",
        style(stats.healthy_providers).bold(),
        stats.total_providers,
        stats.total_calls,
        stats.success_rate_percent
    );
    println!();
}

fn health_cell(provider: &ProviderStats) -> Cell {
    if !provider.configured {
        Cell::new("no key").fg(Color::DarkGrey)
    } else if provider.is_healthy {
        Cell::new("healthy").fg(Color::Green)
    } else {
        Cell::new("UNHEALTHY").fg(Color::Red)
    }
}

/// Human-friendly age of a timestamp ("3s ago").
fn ago(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "-".to_string();
    };
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        _ => format!("{}h ago", secs / 3600),
    }
}
