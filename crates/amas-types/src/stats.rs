//! Statistics snapshots reported by the dispatcher.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of one provider's health counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStats {
    pub id: String,
    pub display_name: String,
    pub priority: i32,
    /// Whether an API key is configured.
    pub configured: bool,
    pub is_healthy: bool,
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Mean latency over every completed call, in milliseconds.
    pub avg_response_time_ms: f64,
    pub last_response_time_ms: Option<u64>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ProviderStats {
    /// Eligible for selection: keyed and not tripped.
    pub fn is_available(&self) -> bool {
        self.configured && self.is_healthy
    }
}

/// Aggregate counters across every provider in the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_providers: usize,
    /// Providers that are keyed and healthy.
    pub healthy_providers: usize,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub success_rate_percent: f64,
    /// Keyed by provider id.
    pub per_provider: BTreeMap<String, ProviderStats>,
}

impl StatsSnapshot {
    /// Aggregate a set of per-provider snapshots.
    pub fn from_providers(providers: Vec<ProviderStats>) -> Self {
        let total_providers = providers.len();
        let healthy_providers = providers.iter().filter(|p| p.is_available()).count();
        let total_calls: u64 = providers.iter().map(|p| p.total_calls).sum();
        let successful_calls: u64 = providers.iter().map(|p| p.success_count).sum();
        let failed_calls: u64 = providers.iter().map(|p| p.failure_count).sum();

        let success_rate_percent = if total_calls == 0 {
            0.0
        } else {
            successful_calls as f64 / total_calls as f64 * 100.0
        };

        let per_provider = providers
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        Self {
            total_providers,
            healthy_providers,
            total_calls,
            successful_calls,
            failed_calls,
            success_rate_percent,
            per_provider,
        }
    }
}
