//! AMAS command-line entry point.
//!
//! Binary name: `amas`
//!
//! Parses CLI arguments, sets up tracing, loads configuration, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::generate::GenerateArgs;
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "amas", &mut std::io::stdout());
        return Ok(());
    }

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,amas_core=debug,amas_infra=debug",
        _ => "trace",
    };
    amas_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Flush exporters on every exit path, including a bad config.
    let outcome = run(cli).await;
    amas_observe::tracing_setup::shutdown_tracing();
    outcome
}

/// Load configuration and run the selected command.
async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Generate {
            prompt,
            system,
            max_tokens,
            temperature,
        } => {
            let args = GenerateArgs {
                prompt,
                system,
                max_tokens,
                temperature,
            };
            cli::generate::generate(&state, args, cli.json, cli.quiet).await
        }
        Commands::Providers => cli::provider::list_providers(&state, cli.json),
        Commands::Bench {
            requests,
            concurrency,
            prompt,
        } => cli::bench::bench(&state, requests, concurrency, &prompt, cli.json).await,
        Commands::Completions { .. } => Ok(()),
    }
}
