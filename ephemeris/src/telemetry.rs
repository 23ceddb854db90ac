use eph_core::ProviderState;
use metrics::{counter, gauge, histogram};

/// Injected observability collaborator.
///
/// The manager, cache wiring, and health monitor record through this type
/// rather than through any global singleton, so the core stays
/// independently testable; metrics flow to whatever recorder the host
/// process installed.
#[derive(Debug, Default)]
pub struct EphemerisTelemetry {
    _phantom: std::marker::PhantomData<()>,
}

impl EphemerisTelemetry {
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn record_request_success(&self, operation: &str, duration_ms: f64) {
        counter!("ephemeris_requests_total",
            "operation" => operation.to_string(),
            "status" => "success"
        )
        .increment(1);
        histogram!("ephemeris_request_duration_seconds",
            "operation" => operation.to_string()
        )
        .record(duration_ms / 1000.0);
    }

    pub fn record_request_failure(&self, operation: &str, error_kind: &str) {
        counter!("ephemeris_requests_total",
            "operation" => operation.to_string(),
            "status" => "failure"
        )
        .increment(1);
        counter!("ephemeris_request_errors_total",
            "operation" => operation.to_string(),
            "error_kind" => error_kind.to_string()
        )
        .increment(1);
    }

    pub fn record_cache_hit(&self, operation: &str) {
        counter!("ephemeris_cache_hits_total",
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    pub fn record_cache_miss(&self, operation: &str) {
        counter!("ephemeris_cache_misses_total",
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    pub fn record_provider_attempt(&self, provider: &str, operation: &str) {
        counter!("ephemeris_provider_attempts_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    pub fn record_provider_failure(&self, provider: &str, error_kind: &str) {
        counter!("ephemeris_provider_failures_total",
            "provider" => provider.to_string(),
            "error_kind" => error_kind.to_string()
        )
        .increment(1);
    }

    pub fn record_failover(&self, operation: &str) {
        counter!("ephemeris_failovers_total",
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    pub fn record_single_flight_wait(&self, operation: &str) {
        counter!("ephemeris_single_flight_waits_total",
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    pub fn record_health_probe(&self, provider: &str, state: ProviderState, latency_ms: f64) {
        counter!("ephemeris_health_probes_total",
            "provider" => provider.to_string(),
            "state" => state.to_string()
        )
        .increment(1);
        histogram!("ephemeris_health_probe_duration_seconds",
            "provider" => provider.to_string()
        )
        .record(latency_ms / 1000.0);
        gauge!("ephemeris_provider_available",
            "provider" => provider.to_string()
        )
        .set(match state {
            ProviderState::Healthy => 1.0,
            ProviderState::Unknown => 0.5,
            ProviderState::Unhealthy | ProviderState::Stopped => 0.0,
        });
    }
}

/// Install a Prometheus exporter on the default endpoint and hand back a
/// telemetry collaborator to inject into the manager.
pub fn init_telemetry() -> Result<EphemerisTelemetry, Box<dyn std::error::Error + Send + Sync>> {
    let telemetry = EphemerisTelemetry::new();

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], 9090))
        .install()?;

    Ok(telemetry)
}

pub fn init_telemetry_with_endpoint(
    endpoint: std::net::SocketAddr,
) -> Result<EphemerisTelemetry, Box<dyn std::error::Error + Send + Sync>> {
    let telemetry = EphemerisTelemetry::new();

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(endpoint)
        .install()?;

    Ok(telemetry)
}
