//! Priority-ordered fallback dispatcher.
//!
//! Each `generate` call performs one fallback scan: providers are visited in
//! priority order, unconfigured or unhealthy ones are skipped without a
//! network call, and the first success ends the scan. Every attempt is
//! recorded against the provider's health. Exhausting the list is reported
//! as a `GenerateResult` with `success == false`, never as an error.
//!
//! Health entries sit behind one mutex each, so concurrent `generate` calls
//! on a shared dispatcher never lose counter updates. Locks are only held
//! for the record step, never across an await.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tracing::{Instrument, debug, error, info, info_span, warn};

use amas_types::config::{DispatchMode, DispatchSettings};
use amas_types::error::ConfigError;
use amas_types::llm::{
    AttemptRecord, Completion, GenerateRequest, GenerateResult, LlmError, ProviderConfig,
};
use amas_types::stats::{ProviderStats, StatsSnapshot};

use super::box_provider::BoxLlmProvider;
use super::health::ProviderHealth;
use super::registry::ProviderRegistry;

/// Error text when a scan finds nothing to attempt.
const NO_ELIGIBLE_PROVIDERS: &str =
    "no eligible providers: every provider is unconfigured or unhealthy";

struct ProviderSlot {
    config: ProviderConfig,
    backend: Option<BoxLlmProvider>,
    health: Mutex<ProviderHealth>,
}

impl ProviderSlot {
    fn health(&self) -> MutexGuard<'_, ProviderHealth> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Why this provider must not be attempted right now, if anything.
    fn skip_reason(&self) -> Option<&'static str> {
        if !self.config.has_api_key() || self.backend.is_none() {
            return Some("no API key configured");
        }
        if !self.health().is_healthy() {
            return Some("unhealthy");
        }
        None
    }
}

struct AttemptOutcome {
    result: Result<Completion, LlmError>,
    latency: Duration,
}

/// Routes generate calls through the registered providers with failover.
pub struct FallbackDispatcher {
    /// In dispatch order.
    slots: Vec<ProviderSlot>,
    settings: DispatchSettings,
}

impl FallbackDispatcher {
    /// Build a dispatcher from a registry.
    ///
    /// Health entries are created 1:1 with the registered providers.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoUsableProviders`] when no provider has an API key.
    pub fn new(registry: ProviderRegistry, settings: DispatchSettings) -> Result<Self, ConfigError> {
        if registry.usable_count() == 0 {
            return Err(ConfigError::NoUsableProviders {
                total: registry.len(),
            });
        }

        let slots: Vec<ProviderSlot> = registry
            .into_ordered()
            .into_iter()
            .map(|entry| ProviderSlot {
                config: entry.config,
                backend: entry.backend,
                health: Mutex::new(ProviderHealth::new(settings.failure_threshold)),
            })
            .collect();

        info!(
            providers = slots.len(),
            usable = slots.iter().filter(|s| s.skip_reason().is_none()).count(),
            mode = ?settings.mode,
            "Fallback dispatcher ready"
        );

        Ok(Self { slots, settings })
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Provider configs in dispatch order.
    pub fn list_providers(&self) -> Vec<&ProviderConfig> {
        self.slots.iter().map(|s| &s.config).collect()
    }

    /// Run one fallback scan for `request`.
    pub async fn generate(&self, request: &GenerateRequest) -> GenerateResult {
        let span = info_span!(
            "gen_ai.dispatch",
            mode = ?self.settings.mode,
            messages = request.messages.len(),
            gen_ai.request.max_tokens = ?request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
        );

        match self.settings.mode {
            DispatchMode::Sequential => self.generate_sequential(request).instrument(span).await,
            DispatchMode::Race => {
                let width = self.settings.race_width.max(1);
                self.generate_racing(request, width).instrument(span).await
            }
        }
    }

    async fn generate_sequential(&self, request: &GenerateRequest) -> GenerateResult {
        let started = Instant::now();
        let mut attempts = Vec::new();
        let mut last_error: Option<LlmError> = None;

        for slot in &self.slots {
            if let Some(reason) = slot.skip_reason() {
                debug!(provider = %slot.config.id, reason, "Skipping provider");
                continue;
            }

            let outcome = self.attempt(slot, request).await;
            match self.settle(slot, outcome, &mut attempts) {
                Ok(completion) => {
                    return GenerateResult::succeeded(
                        &slot.config.id,
                        completion,
                        attempts,
                        elapsed_ms(started),
                    );
                }
                Err(err) => last_error = Some(err),
            }
        }

        self.exhausted(last_error, attempts, started)
    }

    /// Attempt eligible providers `width` at a time, in priority order.
    ///
    /// The first success in a batch wins; the rest of that batch is dropped
    /// mid-flight and not recorded. A fully failed batch moves on to the next.
    /// Eligibility is checked as each batch is formed, so a provider tripped
    /// by a concurrent call while an earlier batch ran is skipped.
    async fn generate_racing(&self, request: &GenerateRequest, width: usize) -> GenerateResult {
        let started = Instant::now();
        let mut attempts = Vec::new();
        let mut last_error: Option<LlmError> = None;
        let mut remaining = self.slots.iter();

        loop {
            let batch: Vec<&ProviderSlot> = remaining
                .by_ref()
                .filter(|slot| match slot.skip_reason() {
                    Some(reason) => {
                        debug!(provider = %slot.config.id, reason, "Skipping provider");
                        false
                    }
                    None => true,
                })
                .take(width)
                .collect();
            if batch.is_empty() {
                break;
            }

            let mut in_flight: FuturesUnordered<_> = batch
                .into_iter()
                .map(|slot| async move { (slot, self.attempt(slot, request).await) })
                .collect();

            while let Some((slot, outcome)) = in_flight.next().await {
                match self.settle(slot, outcome, &mut attempts) {
                    Ok(completion) => {
                        if !in_flight.is_empty() {
                            debug!(cancelled = in_flight.len(), "Dropping slower race participants");
                        }
                        return GenerateResult::succeeded(
                            &slot.config.id,
                            completion,
                            attempts,
                            elapsed_ms(started),
                        );
                    }
                    Err(err) => last_error = Some(err),
                }
            }
        }

        self.exhausted(last_error, attempts, started)
    }

    /// One shot at one provider, bounded by its configured timeout.
    async fn attempt(&self, slot: &ProviderSlot, request: &GenerateRequest) -> AttemptOutcome {
        let started = Instant::now();
        let Some(backend) = slot.backend.as_ref() else {
            return AttemptOutcome {
                result: Err(LlmError::NotConfigured(slot.config.id.clone())),
                latency: Duration::ZERO,
            };
        };

        let timeout = slot.config.timeout();
        let span = info_span!(
            "gen_ai.attempt",
            gen_ai.system = %slot.config.id,
            gen_ai.request.model = %slot.config.model_id,
            timeout_ms = timeout.as_millis() as u64,
        );

        let result = match tokio::time::timeout(timeout, backend.complete(request))
            .instrument(span)
            .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        AttemptOutcome {
            result,
            latency: started.elapsed(),
        }
    }

    /// Record an attempt's outcome against health and the attempt log.
    fn settle(
        &self,
        slot: &ProviderSlot,
        outcome: AttemptOutcome,
        attempts: &mut Vec<AttemptRecord>,
    ) -> Result<Completion, LlmError> {
        let latency_ms = outcome.latency.as_millis() as u64;

        match outcome.result {
            Ok(completion) => {
                slot.health().record_success(outcome.latency);
                info!(provider = %slot.config.id, latency_ms, "Provider succeeded");
                attempts.push(AttemptRecord {
                    provider_id: slot.config.id.clone(),
                    success: true,
                    latency_ms,
                    error: None,
                });
                Ok(completion)
            }
            Err(err) => {
                let tripped = slot.health().record_failure(outcome.latency, &err);
                warn!(
                    provider = %slot.config.id,
                    error = %err,
                    latency_ms,
                    "Provider failed, trying next in chain"
                );
                if tripped {
                    warn!(
                        provider = %slot.config.id,
                        threshold = self.settings.failure_threshold,
                        "Provider marked unhealthy"
                    );
                }
                attempts.push(AttemptRecord {
                    provider_id: slot.config.id.clone(),
                    success: false,
                    latency_ms,
                    error: Some(err.to_string()),
                });
                Err(err)
            }
        }
    }

    fn exhausted(
        &self,
        last_error: Option<LlmError>,
        attempts: Vec<AttemptRecord>,
        started: Instant,
    ) -> GenerateResult {
        let message = match last_error {
            Some(err) => err.to_string(),
            None => NO_ELIGIBLE_PROVIDERS.to_string(),
        };
        error!(attempts = attempts.len(), error = %message, "All providers failed");
        GenerateResult::all_failed(message, attempts, elapsed_ms(started))
    }

    /// Aggregate counters across all providers.
    pub fn get_stats(&self) -> StatsSnapshot {
        StatsSnapshot::from_providers(
            self.slots
                .iter()
                .map(|slot| slot.health().to_stats(&slot.config))
                .collect(),
        )
    }

    pub fn provider_stats(&self, id: &str) -> Option<ProviderStats> {
        self.slots
            .iter()
            .find(|slot| slot.config.id == id)
            .map(|slot| slot.health().to_stats(&slot.config))
    }

    /// Mark every provider healthy again.
    pub fn reset_health(&self) {
        for slot in &self.slots {
            slot.health().reset();
        }
        info!(providers = self.slots.len(), "Provider health reset");
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use secrecy::SecretString;

    use amas_types::llm::{Message, RequestFamily};

    use super::*;
    use crate::llm::provider::LlmProvider;

    // --- Mock providers ---

    #[derive(Clone)]
    enum Behavior {
        Succeed(&'static str),
        FailWith(u16),
        /// Sleep, then succeed.
        Slow(Duration, &'static str),
        /// The first call sleeps before failing; later calls fail at once.
        SlowFirstFailure(Duration, u16),
    }

    struct MockProvider {
        name: String,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl MockProvider {
        fn new(name: &str, behavior: Behavior) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let provider = Self {
                name: name.to_string(),
                behavior,
                calls: Arc::clone(&calls),
            };
            (provider, calls)
        }
    }

    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn complete(&self, _request: &GenerateRequest) -> Result<Completion, LlmError> {
            let previous_calls = self.calls.fetch_add(1, Ordering::SeqCst);
            let content = match &self.behavior {
                Behavior::Succeed(content) => content,
                Behavior::FailWith(status_code) => {
                    return Err(LlmError::Provider {
                        status_code: *status_code,
                        body: format!("{} is down", self.name),
                    });
                }
                Behavior::Slow(delay, content) => {
                    tokio::time::sleep(*delay).await;
                    content
                }
                Behavior::SlowFirstFailure(delay, status_code) => {
                    if previous_calls == 0 {
                        tokio::time::sleep(*delay).await;
                    }
                    return Err(LlmError::Provider {
                        status_code: *status_code,
                        body: format!("{} is down", self.name),
                    });
                }
            };
            Ok(Completion {
                content: content.to_string(),
                provider_name: self.name.clone(),
                raw_usage: None,
            })
        }
    }

    fn config(id: &str, priority: i32, key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            id: id.to_string(),
            display_name: id.to_string(),
            api_key: key.map(SecretString::from),
            base_url: format!("https://{id}.example.com/v1"),
            model_id: format!("{id}-model"),
            request_family: RequestFamily::OpenAiChat,
            priority,
            max_tokens: 1024,
            timeout_seconds: 1,
            extra_headers: BTreeMap::new(),
        }
    }

    struct Harness {
        dispatcher: FallbackDispatcher,
        calls: BTreeMap<String, Arc<AtomicUsize>>,
    }

    impl Harness {
        fn calls(&self, id: &str) -> usize {
            self.calls[id].load(Ordering::SeqCst)
        }

        fn stats(&self, id: &str) -> ProviderStats {
            self.dispatcher.provider_stats(id).unwrap()
        }
    }

    /// (id, priority, has_key, behavior)
    fn harness(
        providers: Vec<(&str, i32, bool, Behavior)>,
        settings: DispatchSettings,
    ) -> Harness {
        let mut registry = ProviderRegistry::new();
        let mut calls = BTreeMap::new();
        for (id, priority, has_key, behavior) in providers {
            let (mock, counter) = MockProvider::new(id, behavior);
            calls.insert(id.to_string(), counter);
            let key = has_key.then_some("test-key");
            registry
                .register(config(id, priority, key), Some(BoxLlmProvider::new(mock)))
                .unwrap();
        }
        Harness {
            dispatcher: FallbackDispatcher::new(registry, settings).unwrap(),
            calls,
        }
    }

    fn request() -> GenerateRequest {
        GenerateRequest::new(vec![Message::user("hello")])
    }

    fn race(width: usize) -> DispatchSettings {
        DispatchSettings {
            mode: DispatchMode::Race,
            race_width: width,
            ..DispatchSettings::default()
        }
    }

    #[tokio::test]
    async fn test_failover_to_second_provider() {
        let h = harness(
            vec![
                ("A", 1, true, Behavior::FailWith(500)),
                ("B", 2, true, Behavior::Succeed("ok")),
            ],
            DispatchSettings::default(),
        );

        let result = h.dispatcher.generate(&request()).await;
        assert!(result.success);
        assert_eq!(result.content, "ok");
        assert_eq!(result.provider_name.as_deref(), Some("B"));
        assert_eq!(result.attempts.len(), 2);
        assert!(!result.attempts[0].success);
        assert!(result.attempts[0].error.as_deref().unwrap().contains("500"));

        assert_eq!(h.stats("A").failure_count, 1);
        assert_eq!(h.stats("B").success_count, 1);
    }

    #[tokio::test]
    async fn test_all_providers_fail() {
        let h = harness(
            vec![
                ("A", 1, true, Behavior::FailWith(500)),
                ("B", 2, true, Behavior::FailWith(500)),
                ("C", 3, true, Behavior::FailWith(503)),
            ],
            DispatchSettings::default(),
        );

        let result = h.dispatcher.generate(&request()).await;
        assert!(!result.success);
        assert_eq!(result.content, "All providers failed");
        let error = result.error.unwrap();
        assert!(error.contains("503"), "last error should win: {error}");

        for id in ["A", "B", "C"] {
            assert_eq!(h.stats(id).failure_count, 1);
            assert_eq!(h.stats(id).total_calls, 1);
        }
    }

    #[tokio::test]
    async fn test_unkeyed_provider_is_never_called() {
        let h = harness(
            vec![
                ("A", 1, false, Behavior::Succeed("should not be used")),
                ("B", 2, true, Behavior::Succeed("ok")),
            ],
            DispatchSettings::default(),
        );

        for _ in 0..3 {
            let result = h.dispatcher.generate(&request()).await;
            assert_eq!(result.provider_name.as_deref(), Some("B"));
        }

        let a = h.stats("A");
        assert_eq!((a.total_calls, a.success_count, a.failure_count), (0, 0, 0));
        assert!(!a.configured);
        assert_eq!(h.calls("A"), 0);
        assert_eq!(h.stats("B").success_count, 3);
    }

    #[tokio::test]
    async fn test_provider_skipped_after_six_failures() {
        let h = harness(
            vec![
                ("A", 1, true, Behavior::FailWith(500)),
                ("B", 2, true, Behavior::Succeed("ok")),
            ],
            DispatchSettings::default(),
        );

        for scan in 1..=6 {
            h.dispatcher.generate(&request()).await;
            assert_eq!(h.stats("A").is_healthy, scan < 6, "after scan {scan}");
        }
        assert_eq!(h.calls("A"), 6);

        let result = h.dispatcher.generate(&request()).await;
        assert!(result.success);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(h.calls("A"), 6);
        assert_eq!(h.stats("A").failure_count, 6);
        assert_eq!(h.stats("A").total_calls, 6);
    }

    #[tokio::test]
    async fn test_reset_health_restores_every_provider() {
        let settings = DispatchSettings {
            failure_threshold: 0,
            ..DispatchSettings::default()
        };
        let h = harness(
            vec![
                ("A", 1, true, Behavior::FailWith(500)),
                ("B", 2, true, Behavior::FailWith(502)),
            ],
            settings,
        );

        h.dispatcher.generate(&request()).await;
        assert_eq!(h.dispatcher.get_stats().healthy_providers, 0);

        let result = h.dispatcher.generate(&request()).await;
        assert!(result.attempts.is_empty());
        assert_eq!(result.error.as_deref(), Some(NO_ELIGIBLE_PROVIDERS));

        h.dispatcher.reset_health();
        let stats = h.dispatcher.get_stats();
        assert_eq!(stats.healthy_providers, 2);
        assert!(stats.per_provider.values().all(|p| p.is_healthy));
        // Lifetime counters survive the reset.
        assert_eq!(stats.failed_calls, 2);
    }

    #[tokio::test]
    async fn test_counters_invariant_over_mixed_sequence() {
        let h = harness(
            vec![
                ("A", 1, true, Behavior::FailWith(500)),
                ("B", 2, true, Behavior::FailWith(429)),
                ("C", 3, true, Behavior::Succeed("ok")),
                ("D", 4, false, Behavior::Succeed("unused")),
            ],
            DispatchSettings::default(),
        );

        for _ in 0..10 {
            h.dispatcher.generate(&request()).await;
            for stats in h.dispatcher.get_stats().per_provider.values() {
                assert_eq!(
                    stats.total_calls,
                    stats.success_count + stats.failure_count,
                    "{}",
                    stats.id
                );
            }
        }

        let stats = h.dispatcher.get_stats();
        assert_eq!(stats.successful_calls, 10);
        // A and B trip after six failures each.
        assert_eq!(stats.failed_calls, 12);
        assert_eq!(stats.total_calls, 22);
        assert!((stats.success_rate_percent - 10.0 / 22.0 * 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stats_before_any_call() {
        let h = harness(
            vec![("A", 1, true, Behavior::Succeed("ok"))],
            DispatchSettings::default(),
        );
        let stats = h.dispatcher.get_stats();
        assert_eq!(stats.total_providers, 1);
        assert_eq!(stats.healthy_providers, 1);
        assert_eq!(stats.total_calls, 0);
        assert_eq!(stats.success_rate_percent, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let h = harness(
            vec![
                ("A", 1, true, Behavior::Slow(Duration::from_secs(10), "late")),
                ("B", 2, true, Behavior::Succeed("ok")),
            ],
            DispatchSettings::default(),
        );

        let result = h.dispatcher.generate(&request()).await;
        assert_eq!(result.content, "ok");
        let a = h.stats("A");
        assert_eq!(a.failure_count, 1);
        assert!(a.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_construction_fails_without_usable_providers() {
        let mut registry = ProviderRegistry::new();
        registry.register(config("A", 1, None), None).unwrap();
        registry.register(config("B", 2, None), None).unwrap();

        let err = FallbackDispatcher::new(registry, DispatchSettings::default()).err();
        assert!(matches!(err, Some(ConfigError::NoUsableProviders { total: 2 })));
    }

    #[tokio::test]
    async fn test_list_providers_in_priority_order() {
        let h = harness(
            vec![
                ("late", 9, true, Behavior::Succeed("ok")),
                ("early", 1, true, Behavior::Succeed("ok")),
            ],
            DispatchSettings::default(),
        );
        let ids: Vec<&str> = h
            .dispatcher
            .list_providers()
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_takes_first_success() {
        let h = harness(
            vec![
                ("A", 1, true, Behavior::Slow(Duration::from_millis(500), "slow")),
                ("B", 2, true, Behavior::Succeed("fast")),
            ],
            race(2),
        );

        let result = h.dispatcher.generate(&request()).await;
        assert!(result.success);
        assert_eq!(result.content, "fast");
        assert_eq!(result.provider_name.as_deref(), Some("B"));
        // A may have been started, but it was cancelled and nothing is recorded.
        assert_eq!(h.stats("A").total_calls, 0);
        assert_eq!(h.stats("B").success_count, 1);
    }

    #[tokio::test]
    async fn test_race_moves_to_next_batch_when_batch_fails() {
        let h = harness(
            vec![
                ("A", 1, true, Behavior::FailWith(500)),
                ("B", 2, true, Behavior::FailWith(500)),
                ("C", 3, true, Behavior::Succeed("third")),
            ],
            race(2),
        );

        let result = h.dispatcher.generate(&request()).await;
        assert_eq!(result.content, "third");
        assert_eq!(result.attempts.len(), 3);
        assert_eq!(h.stats("A").failure_count, 1);
        assert_eq!(h.stats("B").failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_skips_provider_tripped_by_concurrent_call() {
        let h = Arc::new(harness(
            vec![
                (
                    "A",
                    1,
                    true,
                    Behavior::SlowFirstFailure(Duration::from_millis(100), 500),
                ),
                ("B", 2, true, Behavior::FailWith(500)),
            ],
            DispatchSettings {
                failure_threshold: 0,
                ..race(1)
            },
        ));

        // The first call stays on A for 100ms.
        let slow_call = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.dispatcher.generate(&request()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Meanwhile a second call trips both providers.
        let fast = h.dispatcher.generate(&request()).await;
        assert!(!fast.success);
        assert_eq!(fast.attempts.len(), 2);
        assert!(!h.stats("B").is_healthy);

        let slow = slow_call.await.unwrap();
        assert!(!slow.success);
        assert_eq!(slow.attempts.len(), 1, "B must not be attempted once tripped");
        assert_eq!(h.calls("B"), 1);
        assert_eq!(h.stats("B").failure_count, 1);
        assert_eq!(h.stats("A").failure_count, 2);
    }

    #[tokio::test]
    async fn test_race_width_zero_behaves_like_one() {
        let h = harness(
            vec![
                ("A", 1, true, Behavior::Succeed("first")),
                ("B", 2, true, Behavior::Succeed("second")),
            ],
            race(0),
        );

        let result = h.dispatcher.generate(&request()).await;
        assert_eq!(result.content, "first");
        assert_eq!(h.calls("B"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_generates_do_not_lose_updates() {
        let h = Arc::new(harness(
            vec![
                ("A", 1, true, Behavior::FailWith(500)),
                ("B", 2, true, Behavior::Succeed("ok")),
            ],
            DispatchSettings {
                failure_threshold: 1_000,
                ..DispatchSettings::default()
            },
        ));

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let h = Arc::clone(&h);
                tokio::spawn(async move { h.dispatcher.generate(&request()).await })
            })
            .collect();
        for task in futures_util::future::join_all(tasks).await {
            assert!(task.unwrap().success);
        }

        assert_eq!(h.stats("A").failure_count, 64);
        assert_eq!(h.stats("B").success_count, 64);
        assert_eq!(h.dispatcher.get_stats().total_calls, 128);
    }
}
