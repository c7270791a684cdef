//! Logging and span export for the `amas` binary.
//!
//! The dispatcher emits two span kinds:
//!
//! - `gen_ai.dispatch`: one per `generate` call, covering the whole fallback
//!   scan (`mode`, message count, requested `max_tokens`/`temperature`).
//! - `gen_ai.attempt`: one per provider tried inside that scan, tagged with
//!   `gen_ai.system` (provider id), `gen_ai.request.model` and `timeout_ms`.
//!
//! Both are printed to stderr when they close, so the elapsed time of every
//! attempt shows up next to its failover events while stdout stays free for
//! command output and `--json`. With `--otel` the same spans are also
//! exported as OpenTelemetry data.
//!
//! ```no_run
//! amas_observe::tracing_setup::init_tracing("warn", false).unwrap();
//! amas_observe::tracing_setup::init_tracing("info,amas_core=debug", true).unwrap();
//! ```

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installed when `--otel` is on; flushed by [`shutdown_tracing`].
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// `RUST_LOG` when set and valid, otherwise `default_directive`.
fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install the global subscriber for dispatch and attempt spans.
///
/// `default_directive` is the filter the CLI derives from `-v`/`--quiet`;
/// `RUST_LOG` overrides it.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(
    default_directive: &str,
    enable_otel: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    let otel_layer = enable_otel.then(|| {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("amas");

        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Flush and shut down the span exporter. No-op without `--otel`.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
