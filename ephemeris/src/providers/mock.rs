//! Scriptable provider for tests and downstream consumers.

use async_trait::async_trait;
use chrono::Utc;
use eph_core::{
    EphemerisError, EphemerisProvider, EphemerisResult, HealthStatus, JulianDay, LunarPosition,
    PlanetaryPositions, Position, ProviderInfo, SolarPosition
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

type PositionsFn = Box<dyn Fn(JulianDay) -> PlanetaryPositions + Send + Sync>;

/// A provider whose behavior is fully controlled by the test:
/// scripted failures, artificial latency, toggleable availability, a
/// configurable data range, and per-method call counting.
pub struct MockProvider {
    name: String,
    data_range: (JulianDay, JulianDay),
    delay: Mutex<Option<Duration>>,
    available: AtomicBool,
    closed: AtomicBool,
    calls: AtomicU64,
    probe_calls: AtomicU64,
    close_calls: AtomicU64,
    script: Mutex<VecDeque<EphemerisError>>,
    sun_template: Mutex<SolarPosition>,
    moon_template: Mutex<LunarPosition>,
    positions_fn: Mutex<Option<PositionsFn>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_range: (JulianDay::new(f64::MIN), JulianDay::new(f64::MAX)),
            delay: Mutex::new(None),
            available: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            calls: AtomicU64::new(0),
            probe_calls: AtomicU64::new(0),
            close_calls: AtomicU64::new(0),
            script: Mutex::new(VecDeque::new()),
            sun_template: Mutex::new(default_solar()),
            moon_template: Mutex::new(default_lunar()),
            positions_fn: Mutex::new(None),
        }
    }

    pub fn with_range(mut self, start: JulianDay, end: JulianDay) -> Self {
        self.data_range = (start, end);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    pub fn with_sun_longitude(self, longitude: f64) -> Self {
        self.sun_template.lock().longitude = longitude;
        self
    }

    /// Replace the planetary snapshot computation wholesale; used to feed
    /// synthetic motion profiles into the retrograde/interpolation tests.
    pub fn with_positions_fn(
        self,
        f: impl Fn(JulianDay) -> PlanetaryPositions + Send + Sync + 'static,
    ) -> Self {
        *self.positions_fn.lock() = Some(Box::new(f));
        self
    }

    /// Queue one scripted failure; each position call consumes one entry
    /// before falling back to success.
    pub fn fail_with(&self, error: EphemerisError) {
        self.script.lock().push_back(error);
    }

    /// Queue `n` copies of the same scripted failure.
    pub fn fail_times(&self, n: usize, error: EphemerisError) {
        let mut script = self.script.lock();
        for _ in 0..n {
            script.push_back(error.clone());
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of position calls served (or failed) so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> u64 {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u64 {
        self.close_calls.load(Ordering::SeqCst)
    }

    async fn enter_call(&self, jd: JulianDay) -> EphemerisResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.closed.load(Ordering::SeqCst) {
            return Err(EphemerisError::ProviderUnavailable {
                reason: format!("{} is closed", self.name),
            });
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(EphemerisError::ProviderUnavailable {
                reason: format!("{} is offline", self.name),
            });
        }

        let (start, end) = self.data_range;
        if jd < start || jd > end {
            return Err(EphemerisError::DataOutOfRange {
                jd: jd.value(),
                start_jd: start.value(),
                end_jd: end.value(),
            });
        }

        if let Some(error) = self.script.lock().pop_front() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl EphemerisProvider for MockProvider {
    async fn planetary_positions(&self, jd: JulianDay) -> EphemerisResult<PlanetaryPositions> {
        self.enter_call(jd).await?;
        if let Some(f) = self.positions_fn.lock().as_ref() {
            return Ok(f(jd));
        }
        let sun = *self.sun_template.lock();
        let moon = *self.moon_template.lock();
        Ok(PlanetaryPositions {
            julian_day: jd,
            sun: Position {
                longitude: sun.longitude,
                latitude: 0.0,
                distance: sun.distance,
                speed: 0.9856,
            },
            moon: Position {
                longitude: moon.longitude,
                latitude: moon.latitude,
                distance: moon.distance / super::AU_KM,
                speed: 13.18,
            },
            mercury: Position::default(),
            venus: Position::default(),
            mars: Position::default(),
            jupiter: Position::default(),
            saturn: Position::default(),
            uranus: Position::default(),
            neptune: Position::default(),
            pluto: Position::default(),
        })
    }

    async fn sun_position(&self, jd: JulianDay) -> EphemerisResult<SolarPosition> {
        self.enter_call(jd).await?;
        let mut sun = *self.sun_template.lock();
        sun.julian_day = jd;
        Ok(sun)
    }

    async fn moon_position(&self, jd: JulianDay) -> EphemerisResult<LunarPosition> {
        self.enter_call(jd).await?;
        let mut moon = *self.moon_template.lock();
        moon.julian_day = jd;
        Ok(moon)
    }

    async fn is_available(&self) -> bool {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        !self.closed.load(Ordering::SeqCst) && self.available.load(Ordering::SeqCst)
    }

    fn data_range(&self) -> (JulianDay, JulianDay) {
        self.data_range
    }

    async fn health_status(&self) -> EphemerisResult<HealthStatus> {
        let start = Instant::now();
        let available = !self.closed.load(Ordering::SeqCst) && self.available.load(Ordering::SeqCst);
        Ok(HealthStatus {
            available,
            last_check: Utc::now(),
            data_start_jd: self.data_range.0.value(),
            data_end_jd: self.data_range.1.value(),
            response_time: start.elapsed(),
            error_message: (!available).then(|| "scripted as unavailable".to_string()),
            version: "mock".to_string(),
            source: self.name.clone(),
        })
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            version: "mock".to_string(),
            source: "scripted fixture".to_string(),
        }
    }

    async fn close(&self) -> EphemerisResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn default_solar() -> SolarPosition {
    SolarPosition {
        julian_day: JulianDay::J2000,
        longitude: 280.0,
        right_ascension: 281.3,
        declination: -23.0,
        distance: 1.0,
        equation_of_time: -3.2,
        mean_anomaly: 357.5,
        true_anomaly: 357.4,
        eccentric_anomaly: 357.45,
        mean_longitude: 280.5,
        apparent_longitude: 280.0,
    }
}

fn default_lunar() -> LunarPosition {
    LunarPosition {
        julian_day: JulianDay::J2000,
        longitude: 222.8,
        latitude: 5.1,
        right_ascension: 221.0,
        declination: -10.8,
        distance: 402_000.0,
        phase: 0.23,
        phase_angle: 57.2,
        illumination: 23.0,
        angular_diameter: 1_794.0,
        mean_anomaly: 135.0,
        true_anomaly: 138.3,
        argument_of_latitude: 97.8,
        mean_longitude: 218.3,
        true_longitude: 222.8,
    }
}
