//! End-to-end manager scenarios: caching, failover, exhaustion, range
//! selection, health monitoring, and cancellation.

use config::{EphemerisConfig, HealthCheckConfig, RetryPolicy};
use eph_core::{EphemerisError, JulianDay, ProviderState};
use ephemeris::cache::NoopCache;
use ephemeris::manager::EphemerisManager;
use ephemeris::providers::{KeplerProvider, MockProvider, SeriesProvider};
use ephemeris::time::to_julian_day;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn fast_config() -> EphemerisConfig {
    EphemerisConfig {
        per_attempt_timeout_ms: 200,
        retry: RetryPolicy {
            max_retries: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_multiplier: 2.0,
            jitter: false,
        },
        health: HealthCheckConfig {
            interval_secs: 1,
            probe_timeout_ms: 100,
        },
        ..EphemerisConfig::default()
    }
}

#[tokio::test]
async fn j2000_sun_position_is_served_and_cached() {
    let provider = Arc::new(MockProvider::new("primary").with_sun_longitude(280.0));
    let manager = EphemerisManager::new(fast_config());
    manager.register_provider("primary", provider.clone()).await;

    let jd = JulianDay::new(2_451_545.0);
    let first = manager.sun_position(jd).await.unwrap();
    assert!((first.longitude - 280.0).abs() < 1e-9);
    assert!((first.distance - 1.0).abs() < 1e-9);

    let second = manager.sun_position(jd).await.unwrap();
    assert_eq!(second.longitude, first.longitude);

    let stats = manager.cache_stats().await;
    assert_eq!(stats.hits, 1, "second request must be a cache hit");
    assert_eq!(provider.call_count(), 1, "provider must be called exactly once");
}

#[tokio::test]
async fn expired_ttl_reaches_the_provider_again() {
    let provider = Arc::new(MockProvider::new("primary"));
    let mut config = fast_config();
    config.cache.ttl_secs = 1;
    let manager = EphemerisManager::new(config);
    manager.register_provider("primary", provider.clone()).await;

    manager.sun_position(JulianDay::J2000).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    manager.sun_position(JulianDay::J2000).await.unwrap();

    assert_eq!(provider.call_count(), 2, "expired entry must recompute");
}

#[tokio::test]
async fn failover_to_fallback_is_invisible_to_the_caller() {
    let primary = Arc::new(MockProvider::new("primary"));
    primary.set_available(false);
    let fallback = Arc::new(MockProvider::new("fallback").with_sun_longitude(123.0));

    let manager = EphemerisManager::new(fast_config());
    manager.register_provider("primary", primary).await;
    manager.register_provider("fallback", fallback).await;

    let sun = manager.sun_position(JulianDay::J2000).await.unwrap();
    assert_eq!(sun.longitude, 123.0);
}

#[tokio::test]
async fn exhaustion_names_every_attempted_provider() {
    let a = Arc::new(MockProvider::new("a"));
    a.set_available(false);
    let b = Arc::new(MockProvider::new("b"));
    b.set_available(false);

    let manager = EphemerisManager::new(fast_config());
    manager.register_provider("a", a).await;
    manager.register_provider("b", b).await;

    let err = manager.moon_position(JulianDay::J2000).await.unwrap_err();
    let rendered = err.to_string();
    assert!(matches!(err, EphemerisError::AllProvidersFailed { .. }));
    assert!(rendered.contains("a:"));
    assert!(rendered.contains("b:"));
    assert!(rendered.contains("moon_position"));
}

#[tokio::test]
async fn range_aware_selection_prefers_the_covering_provider() {
    // Kepler's window ends in 2650 CE; series carries on for millennia.
    let manager = EphemerisManager::new(fast_config());
    manager
        .register_provider("kepler", Arc::new(KeplerProvider::new()))
        .await;
    manager
        .register_provider("series", Arc::new(SeriesProvider::new()))
        .await;

    let beyond_kepler = JulianDay::new(3_000_000.0);
    let sun = manager.sun_position(beyond_kepler).await.unwrap();
    assert!(sun.longitude.is_finite());

    let info = manager.provider_info().await;
    assert_eq!(info[0].0, "kepler", "registration order is preserved");
}

#[tokio::test]
async fn builtin_providers_agree_through_the_manager() {
    let manager = EphemerisManager::new(fast_config());
    manager
        .register_provider("series", Arc::new(SeriesProvider::new()))
        .await;

    let sun = manager.sun_position(JulianDay::J2000).await.unwrap();
    assert!((sun.longitude - 280.0).abs() < 1.0);
    assert!(sun.distance > 0.97 && sun.distance < 1.02);

    let positions = manager.planetary_positions(JulianDay::J2000).await.unwrap();
    assert!((positions.sun.longitude - sun.longitude).abs() < 0.1);
}

#[tokio::test]
async fn time_conversion_feeds_the_manager() {
    use chrono::TimeZone;

    let manager = EphemerisManager::new(fast_config());
    manager
        .register_provider("series", Arc::new(SeriesProvider::new()))
        .await;

    let t = chrono::Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
    let sun = manager.sun_position(to_julian_day(t)).await.unwrap();
    assert!((sun.longitude - 280.0).abs() < 1.0);
}

#[tokio::test]
async fn health_monitor_steers_selection_away_from_sick_providers() {
    let sick = Arc::new(MockProvider::new("sick").with_sun_longitude(1.0));
    sick.set_available(false);
    let healthy = Arc::new(MockProvider::new("healthy").with_sun_longitude(2.0));

    let manager = EphemerisManager::new(fast_config());
    manager.register_provider("sick", sick.clone()).await;
    manager.register_provider("healthy", healthy).await;
    manager.start_health_monitor();

    // Give the monitor its initial sweep.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let statuses = manager.health_status().await;
    assert!(!statuses["sick"].available);
    assert!(statuses["healthy"].available);

    let sun = manager.sun_position(JulianDay::J2000).await.unwrap();
    assert_eq!(sun.longitude, 2.0);
    assert_eq!(sick.call_count(), 0);

    manager.close().await.unwrap();
}

#[tokio::test]
async fn cancellation_aborts_promptly() {
    let slow = Arc::new(MockProvider::new("slow").with_delay(Duration::from_millis(500)));
    let manager = Arc::new(EphemerisManager::new(fast_config()));
    manager.register_provider("slow", slow).await;

    let call = {
        let manager = manager.clone();
        async move { manager.sun_position(JulianDay::J2000).await }
    };

    let started = Instant::now();
    let outcome = tokio::time::timeout(Duration::from_millis(50), call).await;
    assert!(outcome.is_err(), "cancelled call must not return a result");
    assert!(
        started.elapsed() < Duration::from_millis(200),
        "cancellation must take effect promptly"
    );
}

#[tokio::test]
async fn noop_cache_disables_caching() {
    let provider = Arc::new(MockProvider::new("p"));
    let manager = EphemerisManager::new(fast_config()).with_cache(Arc::new(NoopCache));
    manager.register_provider("p", provider.clone()).await;

    manager.sun_position(JulianDay::J2000).await.unwrap();
    manager.sun_position(JulianDay::J2000).await.unwrap();

    assert_eq!(provider.call_count(), 2, "every request recomputes");
}

#[tokio::test]
async fn close_releases_providers_and_stops_the_monitor() {
    let provider = Arc::new(MockProvider::new("p"));
    let manager = EphemerisManager::new(fast_config());
    manager.register_provider("p", provider.clone()).await;
    manager.start_health_monitor();
    tokio::time::sleep(Duration::from_millis(50)).await;

    manager.close().await.unwrap();
    assert_eq!(provider.close_count(), 1);

    // Closed manager refuses new work; a second close is a no-op.
    assert!(manager.sun_position(JulianDay::J2000).await.is_err());
    manager.close().await.unwrap();
    assert_eq!(provider.close_count(), 1);
}

#[tokio::test]
async fn concurrent_mixed_load_is_consistent() {
    let manager = Arc::new(EphemerisManager::new(fast_config()));
    manager
        .register_provider("series", Arc::new(SeriesProvider::new()))
        .await;

    let mut handles = Vec::new();
    for i in 0..16u32 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            let jd = JulianDay::J2000 + f64::from(i % 4);
            match i % 3 {
                0 => manager.sun_position(jd).await.map(|p| p.longitude),
                1 => manager.moon_position(jd).await.map(|p| p.longitude),
                _ => manager.planetary_positions(jd).await.map(|p| p.sun.longitude),
            }
        }));
    }

    for handle in handles {
        let longitude = handle.await.unwrap().unwrap();
        assert!((0.0..360.0).contains(&longitude));
    }

    let stats = manager.cache_stats().await;
    // 4 distinct days × 3 quantities at most.
    assert!(stats.entries <= 12);
}
