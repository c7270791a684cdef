//! Provider health tracking for the fallback dispatcher.
//!
//! A deliberately blunt gate: a provider is healthy until its failures since
//! the last reset exceed the threshold, then it stays unhealthy until
//! [`ProviderHealth::reset`] is called. There is no half-open probing and no
//! time-based recovery.

use std::time::Duration;

use chrono::{DateTime, Utc};

use amas_types::llm::{LlmError, ProviderConfig};
use amas_types::stats::ProviderStats;

/// Default number of failures tolerated before a provider is tripped.
pub const DEFAULT_FAILURE_THRESHOLD: u64 = 5;

/// Mutable health state for a single provider.
///
/// Invariant: `total_calls == success_count + failure_count`.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    total_calls: u64,
    success_count: u64,
    failure_count: u64,
    /// Failures since construction or the last reset; drives the gate.
    failures_since_reset: u64,
    is_healthy: bool,
    /// Sum of latencies of every completed call.
    total_latency: Duration,
    last_latency: Option<Duration>,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    failure_threshold: u64,
}

impl ProviderHealth {
    pub fn new(failure_threshold: u64) -> Self {
        Self {
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            failures_since_reset: 0,
            is_healthy: true,
            total_latency: Duration::ZERO,
            last_latency: None,
            last_success_at: None,
            last_failure_at: None,
            last_error: None,
            failure_threshold,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record a successful call that took `latency`.
    pub fn record_success(&mut self, latency: Duration) {
        self.total_calls += 1;
        self.success_count += 1;
        self.track_latency(latency);
        self.last_success_at = Some(Utc::now());
    }

    /// Record a failed call that took `latency`.
    ///
    /// Returns `true` when this failure tripped the provider to unhealthy.
    pub fn record_failure(&mut self, latency: Duration, error: &LlmError) -> bool {
        self.total_calls += 1;
        self.failure_count += 1;
        self.failures_since_reset += 1;
        self.track_latency(latency);
        self.last_failure_at = Some(Utc::now());
        self.last_error = Some(error.to_string());

        if self.is_healthy && self.failures_since_reset > self.failure_threshold {
            self.is_healthy = false;
            return true;
        }
        false
    }

    /// Mark the provider healthy again. Lifetime counters are kept.
    pub fn reset(&mut self) {
        self.is_healthy = true;
        self.failures_since_reset = 0;
    }

    /// Arithmetic mean over every completed call, in milliseconds.
    pub fn avg_response_time_ms(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.total_latency.as_secs_f64() * 1000.0 / self.total_calls as f64
    }

    fn track_latency(&mut self, latency: Duration) {
        self.total_latency += latency;
        self.last_latency = Some(latency);
    }

    /// Snapshot for stats reporting.
    pub fn to_stats(&self, config: &ProviderConfig) -> ProviderStats {
        ProviderStats {
            id: config.id.clone(),
            display_name: config.display_name.clone(),
            priority: config.priority,
            configured: config.has_api_key(),
            is_healthy: self.is_healthy,
            total_calls: self.total_calls,
            success_count: self.success_count,
            failure_count: self.failure_count,
            avg_response_time_ms: self.avg_response_time_ms(),
            last_response_time_ms: self.last_latency.map(|d| d.as_millis() as u64),
            last_success_at: self.last_success_at,
            last_failure_at: self.last_failure_at,
            last_error: self.last_error.clone(),
        }
    }
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}
