//! `amas generate`: one fallback scan for a single prompt.

use anyhow::{Context, Result, bail};
use console::style;
use tokio::io::AsyncReadExt;

use amas_types::llm::{GenerateRequest, GenerateResult, Message};

use crate::state::AppState;

pub struct GenerateArgs {
    pub prompt: Option<String>,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// Assemble the message list: optional system message, then the prompt.
fn build_request(args: GenerateArgs, prompt: String) -> GenerateRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = args.system {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(prompt));

    let mut request = GenerateRequest::new(messages);
    if let Some(max_tokens) = args.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }
    if let Some(temperature) = args.temperature {
        request = request.with_temperature(temperature);
    }
    request
}

async fn read_prompt(prompt: Option<String>) -> Result<String> {
    let prompt = match prompt {
        Some(prompt) => prompt,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read prompt from stdin")?;
            buf
        }
    };

    let prompt = prompt.trim().to_string();
    if prompt.is_empty() {
        bail!("prompt is empty");
    }
    Ok(prompt)
}

pub async fn generate(state: &AppState, mut args: GenerateArgs, json: bool, quiet: bool) -> Result<()> {
    let prompt = read_prompt(args.prompt.take()).await?;
    let dispatcher = state.dispatcher()?;
    let request = build_request(args, prompt);

    let result = dispatcher.generate(&request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result, quiet);
    }

    if !result.success {
        bail!(
            "{}: {}",
            result.content,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_result(result: &GenerateResult, quiet: bool) {
    if result.success {
        println!("{}", result.content);
    }
    if quiet {
        return;
    }

    eprintln!();
    for attempt in &result.attempts {
        let mark = if attempt.success {
            style("✓").green()
        } else {
            style("✗").red()
        };
        let detail = attempt.error.as_deref().unwrap_or("ok");
        eprintln!(
            "  {} {} {} {}",
            mark,
            style(&attempt.provider_id).cyan(),
            style(format!("{}ms", attempt.latency_ms)).dim(),
            style(super::truncate(detail, 80)).dim()
        );
    }
    if let Some(name) = &result.provider_name {
        eprintln!(
            "  {} answered in {}ms",
            style(name).bold(),
            result.latency_ms
        );
    }
}
