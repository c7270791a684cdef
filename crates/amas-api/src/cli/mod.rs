//! CLI command definitions for the `amas` binary.
//!
//! Uses clap derive macros for argument parsing. Every command accepts the
//! global `--json`, `--quiet`, `-v` and `--config` flags.

pub mod bench;
pub mod generate;
pub mod provider;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Send prompts through a priority-ordered chain of LLM providers.
#[derive(Parser)]
#[command(name = "amas", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.amas/config.toml).
    #[arg(long, global = true, env = "AMAS_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Export tracing spans to stdout as OpenTelemetry data.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a completion, failing over between providers.
    #[command(alias = "gen")]
    Generate {
        /// Prompt text. Read from stdin when omitted.
        prompt: Option<String>,

        /// System message placed before the prompt.
        #[arg(long, short)]
        system: Option<String>,

        /// Upper bound on generated tokens (clamped to each provider's limit).
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Sampling temperature.
        #[arg(long)]
        temperature: Option<f64>,
    },

    /// List providers in dispatch order with their key status.
    #[command(alias = "ls")]
    Providers,

    /// Run a batch of generate calls and print provider statistics.
    Bench {
        /// Total number of generate calls.
        #[arg(long, short = 'n', default_value = "10")]
        requests: usize,

        /// Calls in flight at once.
        #[arg(long, short, default_value = "4")]
        concurrency: usize,

        /// Prompt sent on every call.
        #[arg(long, default_value = "Reply with the single word: pong")]
        prompt: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Shorten `text` to at most `max` characters for table cells.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
