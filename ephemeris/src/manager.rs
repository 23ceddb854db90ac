//! Provider orchestration: cache-first request handling, range- and
//! health-aware selection, bounded retry, failover, and shutdown.

use config::EphemerisConfig;
use dashmap::DashMap;
use eph_core::{
    EphemerisError, EphemerisProvider, EphemerisResult, HealthStatus, JulianDay, LunarPosition,
    PlanetaryPositions, ProviderAttempt, ProviderInfo, SolarPosition
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;

use crate::cache::{CacheValue, MemoryCache, PositionCache, QuantityKind, cache_key};
use crate::health::{HealthMonitor, ProviderHealth};
use crate::retry::with_retry;
use crate::telemetry::EphemerisTelemetry;

/// One registered provider with its preference label.
#[derive(Clone)]
pub struct ProviderEntry {
    pub label: String,
    pub provider: Arc<dyn EphemerisProvider>,
}

/// Orchestrator in front of an ordered list of position providers.
///
/// Requests are served from the cache when possible; on a miss the manager
/// walks the providers in registration order, skipping the ones whose
/// declared Julian-Day range misses the request or which the health
/// monitor marks unavailable (unless nothing else is left), retrying
/// transient failures with backoff, and failing over on permanent ones.
/// Concurrent misses for the same key collapse into one computation.
pub struct EphemerisManager {
    providers: Arc<RwLock<Vec<ProviderEntry>>>,
    cache: Arc<dyn PositionCache>,
    telemetry: Arc<EphemerisTelemetry>,
    config: EphemerisConfig,
    monitor: HealthMonitor,
    inflight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    closed: AtomicBool,
}

impl EphemerisManager {
    pub fn new(config: EphemerisConfig) -> Self {
        let providers: Arc<RwLock<Vec<ProviderEntry>>> = Arc::new(RwLock::new(Vec::new()));
        let telemetry = Arc::new(EphemerisTelemetry::new());
        let monitor = HealthMonitor::new(
            providers.clone(),
            config.health.clone(),
            telemetry.clone(),
        );
        Self {
            cache: Arc::new(MemoryCache::new(config.cache.max_entries)),
            providers,
            telemetry,
            config,
            monitor,
            inflight: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn PositionCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<EphemerisTelemetry>) -> Self {
        self.monitor = HealthMonitor::new(
            self.providers.clone(),
            self.config.health.clone(),
            telemetry.clone(),
        );
        self.telemetry = telemetry;
        self
    }

    /// Register a provider under `label`. Registration order is the
    /// failover preference order: register the primary first.
    pub async fn register_provider(
        &self,
        label: impl Into<String>,
        provider: Arc<dyn EphemerisProvider>,
    ) {
        let label = label.into();
        tracing::info!(provider = %label, "registering ephemeris provider");
        self.providers.write().await.push(ProviderEntry { label, provider });
    }

    /// Start the background health monitor. Requests work without it (all
    /// providers then count as usable), but selection only reacts to
    /// provider health once it runs.
    pub fn start_health_monitor(&self) {
        self.monitor.start();
    }

    pub async fn planetary_positions(
        &self,
        jd: JulianDay,
    ) -> EphemerisResult<PlanetaryPositions> {
        match self.request(QuantityKind::PlanetaryPositions, jd).await? {
            CacheValue::Planetary(positions) => Ok(positions),
            _ => Err(mismatched_cache_entry(QuantityKind::PlanetaryPositions)),
        }
    }

    pub async fn sun_position(&self, jd: JulianDay) -> EphemerisResult<SolarPosition> {
        match self.request(QuantityKind::SunPosition, jd).await? {
            CacheValue::Solar(position) => Ok(position),
            _ => Err(mismatched_cache_entry(QuantityKind::SunPosition)),
        }
    }

    pub async fn moon_position(&self, jd: JulianDay) -> EphemerisResult<LunarPosition> {
        match self.request(QuantityKind::MoonPosition, jd).await? {
            CacheValue::Lunar(position) => Ok(position),
            _ => Err(mismatched_cache_entry(QuantityKind::MoonPosition)),
        }
    }

    async fn request(&self, kind: QuantityKind, jd: JulianDay) -> EphemerisResult<CacheValue> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EphemerisError::ProviderUnavailable {
                reason: "manager is closed".to_string(),
            });
        }

        let started = Instant::now();
        let deadline = self.config.overall_timeout().map(|limit| started + limit);
        let key = cache_key(kind, jd);

        if let Some(value) = self.cache.get(&key).await {
            self.telemetry.record_cache_hit(kind.as_str());
            return Ok(value);
        }
        self.telemetry.record_cache_miss(kind.as_str());

        // Collapse concurrent misses for the same key: whoever takes the
        // key lock first computes, everyone else finds the cache warm on
        // the re-check.
        let key_lock = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let guard = key_lock.lock().await;

        let result = match self.cache.get(&key).await {
            Some(value) => {
                self.telemetry.record_single_flight_wait(kind.as_str());
                Ok(value)
            }
            None => {
                let result = self.compute(kind, jd, deadline).await;
                if let Ok(value) = &result {
                    self.cache.set(&key, *value, self.config.cache.ttl()).await;
                }
                result
            }
        };

        drop(guard);
        self.inflight.remove(&key);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => self.telemetry.record_request_success(kind.as_str(), elapsed_ms),
            Err(err) => self.telemetry.record_request_failure(kind.as_str(), err.kind()),
        }
        result
    }

    async fn compute(
        &self,
        kind: QuantityKind,
        jd: JulianDay,
        deadline: Option<Instant>,
    ) -> EphemerisResult<CacheValue> {
        let providers: Vec<ProviderEntry> = self.providers.read().await.clone();
        if providers.is_empty() {
            return Err(EphemerisError::CalculationFailed {
                reason: "no providers registered".to_string(),
            });
        }

        // If no provider covers the requested day, attempt them all anyway
        // so the caller sees the out-of-range error instead of an empty
        // walk. Health-based skipping only considers the range-eligible
        // candidates, and is disabled when it would leave nothing to try.
        let any_covers = providers.iter().any(|e| e.provider.covers(jd));
        let eligible: Vec<&ProviderEntry> = providers
            .iter()
            .filter(|entry| {
                let in_range = !any_covers || entry.provider.covers(jd);
                if !in_range {
                    tracing::debug!(provider = %entry.label, %jd, "skipping provider outside data range");
                }
                in_range
            })
            .collect();
        let any_usable = eligible.iter().any(|e| self.monitor.is_usable(&e.label));

        let mut attempts: Vec<ProviderAttempt> = Vec::new();
        let mut last_error: Option<EphemerisError> = None;

        for entry in eligible {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(EphemerisError::Cancelled {
                        reason: "overall deadline elapsed during provider selection".to_string(),
                    });
                }
            }

            if any_usable && !self.monitor.is_usable(&entry.label) {
                tracing::debug!(provider = %entry.label, "skipping unhealthy provider");
                continue;
            }

            if !attempts.is_empty() {
                self.telemetry.record_failover(kind.as_str());
                tracing::warn!(
                    provider = %entry.label,
                    "failing over after {} failed provider(s)",
                    attempts.len()
                );
            }
            self.telemetry.record_provider_attempt(&entry.label, kind.as_str());

            let outcome = self
                .bounded(deadline, with_retry(&self.config.retry, || {
                    self.attempt(entry, kind, jd)
                }))
                .await;

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_cancellation() => return Err(err),
                Err(err) => {
                    self.telemetry.record_provider_failure(&entry.label, err.kind());
                    tracing::warn!(provider = %entry.label, error = %err, "provider failed");
                    attempts.push(ProviderAttempt {
                        provider: entry.label.clone(),
                        error: err.to_string(),
                    });
                    last_error = Some(err);
                }
            }
        }

        match (attempts.len(), last_error) {
            (0, _) => Err(EphemerisError::CalculationFailed {
                reason: "every registered provider was skipped".to_string(),
            }),
            // A sole candidate's own error is more useful than a wrapper.
            (1, Some(err)) => Err(err),
            (_, _) => Err(EphemerisError::AllProvidersFailed {
                operation: kind.as_str().to_string(),
                attempts,
            }),
        }
    }

    /// One provider call under the per-attempt timeout.
    async fn attempt(
        &self,
        entry: &ProviderEntry,
        kind: QuantityKind,
        jd: JulianDay,
    ) -> EphemerisResult<CacheValue> {
        let timeout = self.config.per_attempt_timeout();
        let call = async {
            match kind {
                QuantityKind::PlanetaryPositions => entry
                    .provider
                    .planetary_positions(jd)
                    .await
                    .map(CacheValue::Planetary),
                QuantityKind::SunPosition => {
                    entry.provider.sun_position(jd).await.map(CacheValue::Solar)
                }
                QuantityKind::MoonPosition => {
                    entry.provider.moon_position(jd).await.map(CacheValue::Lunar)
                }
            }
        };

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(EphemerisError::RequestTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Bound `future` by the remaining overall deadline, if one is set.
    async fn bounded<T>(
        &self,
        deadline: Option<Instant>,
        future: impl std::future::Future<Output = EphemerisResult<T>>,
    ) -> EphemerisResult<T> {
        match deadline {
            None => future.await,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match tokio::time::timeout(remaining, future).await {
                    Ok(result) => result,
                    Err(_) => Err(EphemerisError::Cancelled {
                        reason: "overall deadline elapsed".to_string(),
                    }),
                }
            }
        }
    }

    /// Health snapshot for every registered provider. Providers the
    /// monitor has not probed yet are queried directly.
    pub async fn health_status(&self) -> HashMap<String, HealthStatus> {
        let probed: HashMap<String, ProviderHealth> = self.monitor.all_statuses();
        let providers = self.providers.read().await;

        let mut result = HashMap::new();
        for entry in providers.iter() {
            if let Some(health) = probed.get(&entry.label).and_then(|h| h.status.clone()) {
                result.insert(entry.label.clone(), health);
            } else if let Ok(status) = entry.provider.health_status().await {
                result.insert(entry.label.clone(), status);
            }
        }
        result
    }

    /// Metadata for every registered provider, in preference order.
    pub async fn provider_info(&self) -> Vec<(String, ProviderInfo)> {
        self.providers
            .read()
            .await
            .iter()
            .map(|e| (e.label.clone(), e.provider.provider_info()))
            .collect()
    }

    /// Cache accounting snapshot.
    pub async fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.stats().await
    }

    /// Stop the health monitor, release every provider, and drop cached
    /// state. Subsequent calls are no-ops.
    pub async fn close(&self) -> EphemerisResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("closing ephemeris manager");

        self.monitor.stop().await;

        let mut failures = Vec::new();
        let providers = self.providers.read().await;
        for entry in providers.iter() {
            if let Err(err) = entry.provider.close().await {
                tracing::error!(provider = %entry.label, error = %err, "provider close failed");
                failures.push(format!("{}: {err}", entry.label));
            }
        }
        drop(providers);

        self.cache.clear().await;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(EphemerisError::CalculationFailed {
                reason: format!("errors during close: {}", failures.join("; ")),
            })
        }
    }
}

fn mismatched_cache_entry(kind: QuantityKind) -> EphemerisError {
    EphemerisError::CalculationFailed {
        reason: format!("cache entry for {} held a different quantity", kind.as_str()),
    }
}
