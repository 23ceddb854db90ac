//! Background health monitoring of registered providers.
//!
//! One periodic task probes every provider under a short timeout and
//! publishes the result into a shared map. The request path reads the map
//! without ever blocking on the monitor; transitions happen only on probe
//! ticks or shutdown.

use chrono::Utc;
use config::HealthCheckConfig;
use dashmap::DashMap;
use eph_core::{HealthStatus, ProviderState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;

use crate::manager::ProviderEntry;
use crate::telemetry::EphemerisTelemetry;

/// Latest probe outcome for one provider.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub state: ProviderState,
    pub status: Option<HealthStatus>,
}

pub struct HealthMonitor {
    providers: Arc<RwLock<Vec<ProviderEntry>>>,
    statuses: Arc<DashMap<String, ProviderHealth>>,
    config: HealthCheckConfig,
    telemetry: Arc<EphemerisTelemetry>,
    shutdown_tx: watch::Sender<bool>,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    pub fn new(
        providers: Arc<RwLock<Vec<ProviderEntry>>>,
        config: HealthCheckConfig,
        telemetry: Arc<EphemerisTelemetry>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            providers,
            statuses: Arc::new(DashMap::new()),
            config,
            telemetry,
            shutdown_tx,
            handle: parking_lot::Mutex::new(None),
        }
    }

    /// Launch the periodic probe task. Idempotent: a second call while the
    /// task is running does nothing.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }

        let providers = self.providers.clone();
        let statuses = self.statuses.clone();
        let telemetry = self.telemetry.clone();
        let probe_timeout = self.config.probe_timeout();
        let interval = self.config.interval();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        *handle = Some(tokio::spawn(async move {
            // Probe once immediately so selection has data before the
            // first tick.
            Self::sweep(&providers, &statuses, &telemetry, probe_timeout).await;

            let mut tick = tokio::time::interval(interval);
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        Self::sweep(&providers, &statuses, &telemetry, probe_timeout).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("health monitor shutting down");
                            break;
                        }
                    }
                }
            }
        }));
        tracing::info!(
            interval_secs = self.config.interval_secs,
            "health monitor started"
        );
    }

    /// Stop the probe task and mark every provider `Stopped`.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let providers = self.providers.read().await;
        for entry in providers.iter() {
            let previous = self
                .statuses
                .get(&entry.label)
                .and_then(|h| h.status.clone());
            self.statuses.insert(
                entry.label.clone(),
                ProviderHealth {
                    state: ProviderState::Stopped,
                    status: previous,
                },
            );
        }
    }

    async fn sweep(
        providers: &Arc<RwLock<Vec<ProviderEntry>>>,
        statuses: &Arc<DashMap<String, ProviderHealth>>,
        telemetry: &Arc<EphemerisTelemetry>,
        probe_timeout: std::time::Duration,
    ) {
        let entries: Vec<ProviderEntry> = providers.read().await.clone();

        for entry in entries {
            let started = Instant::now();
            let available =
                match tokio::time::timeout(probe_timeout, entry.provider.is_available()).await {
                    Ok(available) => available,
                    Err(_) => {
                        tracing::warn!(
                            provider = %entry.label,
                            timeout_ms = probe_timeout.as_millis() as u64,
                            "health probe timed out"
                        );
                        false
                    }
                };
            let elapsed = started.elapsed();

            let status = if available {
                match tokio::time::timeout(probe_timeout, entry.provider.health_status()).await {
                    Ok(Ok(status)) => Some(status),
                    _ => None,
                }
            } else {
                None
            };

            let (start_jd, end_jd) = entry.provider.data_range();
            let status = status.unwrap_or_else(|| HealthStatus {
                available,
                last_check: Utc::now(),
                data_start_jd: start_jd.value(),
                data_end_jd: end_jd.value(),
                response_time: elapsed,
                error_message: (!available).then(|| "provider not available".to_string()),
                version: entry.provider.provider_info().version,
                source: entry.label.clone(),
            });

            let state = if available {
                ProviderState::Healthy
            } else {
                ProviderState::Unhealthy
            };

            let transitioned = statuses
                .get(&entry.label)
                .map(|h| h.state != state)
                .unwrap_or(true);
            if transitioned {
                tracing::info!(provider = %entry.label, state = %state, "provider health transition");
            }

            telemetry.record_health_probe(&entry.label, state, elapsed.as_secs_f64() * 1000.0);
            statuses.insert(
                entry.label.clone(),
                ProviderHealth {
                    state,
                    status: Some(status),
                },
            );
        }
    }

    /// Current state for one provider label; `Unknown` before first probe.
    pub fn state_of(&self, label: &str) -> ProviderState {
        self.statuses
            .get(label)
            .map(|h| h.state)
            .unwrap_or(ProviderState::Unknown)
    }

    /// Whether selection should consider this provider. Providers never
    /// probed yet count as usable so an unstarted monitor never blocks
    /// requests.
    pub fn is_usable(&self, label: &str) -> bool {
        !matches!(
            self.state_of(label),
            ProviderState::Unhealthy | ProviderState::Stopped
        )
    }

    /// Snapshot of every probed provider.
    pub fn all_statuses(&self) -> HashMap<String, ProviderHealth> {
        self.statuses
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Run one probe sweep immediately, outside the periodic schedule.
    pub async fn probe_now(&self) {
        Self::sweep(
            &self.providers,
            &self.statuses,
            &self.telemetry,
            self.config.probe_timeout(),
        )
        .await;
    }
}
