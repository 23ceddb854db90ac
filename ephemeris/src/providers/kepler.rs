//! Fallback provider using low-order Keplerian mean elements.
//!
//! Coarser than [`SeriesProvider`](super::SeriesProvider) (two-term
//! equation of center, single-term lunar corrections, constant mean
//! motions) and valid over a narrower window, but dependency-free and
//! cheap; exists so the manager can degrade rather than fail.

use async_trait::async_trait;
use chrono::Utc;
use eph_core::{
    Body, EphemerisError, EphemerisProvider, EphemerisResult, HealthStatus, JulianDay,
    LunarPosition, PlanetaryPositions, Position, ProviderInfo, SolarPosition
};
use std::time::Instant;

use super::{
    AU_KM, elongation_degrees, equatorial_from_ecliptic, lunar_angular_diameter,
    normalize_degrees, phase_from_elongation
};

const DATA_START_JD: f64 = 1_550_184.5; // 1550-01-01
const DATA_END_JD: f64 = 2_816_787.5; // 2650-12-31

pub struct KeplerProvider {
    name: String,
    version: String,
}

impl KeplerProvider {
    pub fn new() -> Self {
        Self {
            name: "kepler".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn check_range(&self, jd: JulianDay) -> EphemerisResult<()> {
        if self.covers(jd) {
            Ok(())
        } else {
            Err(EphemerisError::DataOutOfRange {
                jd: jd.value(),
                start_jd: DATA_START_JD,
                end_jd: DATA_END_JD,
            })
        }
    }

    fn sun(&self, jd: JulianDay) -> Position {
        let t = jd.days_since_j2000();
        let l = normalize_degrees(280.460 + 0.9856474 * t);
        let m = normalize_degrees(357.528 + 0.9856003 * t);
        let m_rad = m.to_radians();

        let lambda = l + 1.915 * m_rad.sin() + 0.020 * (2.0 * m_rad).sin();
        let distance = 1.00014 - 0.01671 * m_rad.cos() - 0.00014 * (2.0 * m_rad).cos();

        Position {
            longitude: normalize_degrees(lambda),
            latitude: 0.0,
            distance,
            speed: 0.9856,
        }
    }

    fn moon(&self, jd: JulianDay) -> Position {
        let t = jd.days_since_j2000();
        let l = normalize_degrees(218.3164591 + 13.1763965268 * t);
        let m = normalize_degrees(134.9634114 + 13.0649929509 * t);
        let f = normalize_degrees(93.2720993 + 13.2299226639 * t);

        let m_rad = m.to_radians();
        let f_rad = f.to_radians();

        let lambda = l + 6.289 * m_rad.sin();
        let beta = 5.128 * f_rad.sin();
        let distance_km = 385_000.0 - 20_905.0 * m_rad.cos();

        Position {
            longitude: normalize_degrees(lambda),
            latitude: beta,
            distance: distance_km / AU_KM,
            speed: 13.18,
        }
    }

    fn planet(&self, jd: JulianDay, body: Body) -> Position {
        let t = jd.days_since_j2000();
        let (l0, m0, rate, distance, speed) = mean_elements(body);

        let l = normalize_degrees(l0 + rate * t);
        let m = normalize_degrees(m0 + rate * t);
        let m_rad = m.to_radians();

        // Single-term eccentricity correction.
        let lambda = l + 2.0 * m_rad.sin();

        Position {
            longitude: normalize_degrees(lambda),
            latitude: 0.0,
            distance,
            speed,
        }
    }

    fn positions(&self, jd: JulianDay) -> PlanetaryPositions {
        PlanetaryPositions {
            julian_day: jd,
            sun: self.sun(jd),
            moon: self.moon(jd),
            mercury: self.planet(jd, Body::Mercury),
            venus: self.planet(jd, Body::Venus),
            mars: self.planet(jd, Body::Mars),
            jupiter: self.planet(jd, Body::Jupiter),
            saturn: self.planet(jd, Body::Saturn),
            uranus: self.planet(jd, Body::Uranus),
            neptune: self.planet(jd, Body::Neptune),
            pluto: self.planet(jd, Body::Pluto),
        }
    }

    fn detailed_sun(&self, jd: JulianDay) -> SolarPosition {
        let t = jd.days_since_j2000();
        let l = normalize_degrees(280.460 + 0.9856474 * t);
        let m = normalize_degrees(357.528 + 0.9856003 * t);
        let m_rad = m.to_radians();

        let c = 1.915 * m_rad.sin() + 0.020 * (2.0 * m_rad).sin();
        let lambda = l + c;

        let epsilon = 23.4393 - 0.0000004 * t;
        let (alpha, delta) = equatorial_from_ecliptic(lambda, 0.0, epsilon);

        let distance = 1.00014 - 0.01671 * m_rad.cos() - 0.00014 * (2.0 * m_rad).cos();
        let mut equation_of_time = l - alpha;
        if equation_of_time > 180.0 {
            equation_of_time -= 360.0;
        } else if equation_of_time < -180.0 {
            equation_of_time += 360.0;
        }
        let equation_of_time = 4.0 * equation_of_time;

        SolarPosition {
            julian_day: jd,
            longitude: normalize_degrees(lambda),
            right_ascension: alpha,
            declination: delta,
            distance,
            equation_of_time,
            mean_anomaly: m,
            true_anomaly: m + c,
            eccentric_anomaly: m + 1.915 * m_rad.sin(),
            mean_longitude: l,
            apparent_longitude: normalize_degrees(lambda),
        }
    }

    fn detailed_moon(&self, jd: JulianDay) -> LunarPosition {
        let t = jd.days_since_j2000();
        let l = normalize_degrees(218.3164591 + 13.1763965268 * t);
        let m = normalize_degrees(134.9634114 + 13.0649929509 * t);
        let f = normalize_degrees(93.2720993 + 13.2299226639 * t);

        let m_rad = m.to_radians();
        let f_rad = f.to_radians();

        let delta_l = 6.289 * m_rad.sin();
        let lambda = l + delta_l;
        let beta = 5.128 * f_rad.sin();
        let distance = 385_000.0 - 20_905.0 * m_rad.cos();

        let epsilon = 23.4393 - 0.0000004 * t;
        let (alpha, delta) = equatorial_from_ecliptic(lambda, beta, epsilon);

        let sun_longitude = self.sun(jd).longitude;
        let phase_angle = elongation_degrees(lambda, sun_longitude);
        let phase = phase_from_elongation(phase_angle);

        LunarPosition {
            julian_day: jd,
            longitude: normalize_degrees(lambda),
            latitude: beta,
            right_ascension: alpha,
            declination: delta,
            distance,
            phase,
            phase_angle,
            illumination: phase * 100.0,
            angular_diameter: lunar_angular_diameter(distance),
            mean_anomaly: m,
            true_anomaly: m + delta_l,
            argument_of_latitude: normalize_degrees(lambda - 125.0),
            mean_longitude: l,
            true_longitude: lambda,
        }
    }
}

impl Default for KeplerProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EphemerisProvider for KeplerProvider {
    async fn planetary_positions(&self, jd: JulianDay) -> EphemerisResult<PlanetaryPositions> {
        self.check_range(jd)?;
        Ok(self.positions(jd))
    }

    async fn sun_position(&self, jd: JulianDay) -> EphemerisResult<SolarPosition> {
        self.check_range(jd)?;
        Ok(self.detailed_sun(jd))
    }

    async fn moon_position(&self, jd: JulianDay) -> EphemerisResult<LunarPosition> {
        self.check_range(jd)?;
        Ok(self.detailed_moon(jd))
    }

    async fn is_available(&self) -> bool {
        self.sun(JulianDay::J2000).longitude.is_finite()
    }

    fn data_range(&self) -> (JulianDay, JulianDay) {
        (JulianDay::new(DATA_START_JD), JulianDay::new(DATA_END_JD))
    }

    async fn health_status(&self) -> EphemerisResult<HealthStatus> {
        let start = Instant::now();
        let probe = self.sun(JulianDay::J2000);
        let available = probe.longitude.is_finite();

        Ok(HealthStatus {
            available,
            last_check: Utc::now(),
            data_start_jd: DATA_START_JD,
            data_end_jd: DATA_END_JD,
            response_time: start.elapsed(),
            error_message: (!available).then(|| "test computation was not finite".to_string()),
            version: self.version.clone(),
            source: self.name.clone(),
        })
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            source: "low-order Keplerian elements".to_string(),
        }
    }

    async fn close(&self) -> EphemerisResult<()> {
        Ok(())
    }
}

/// (L₀, M₀, mean motion °/day, distance AU, speed °/day) per planet.
fn mean_elements(body: Body) -> (f64, f64, f64, f64, f64) {
    match body {
        Body::Mercury => (252.25084, 174.79252, 4.092338796, 0.387098, 4.092),
        Body::Venus => (181.97973, 50.41575, 1.602136, 0.723327, 1.602),
        Body::Mars => (355.433, 19.3879, 0.524033, 1.523679, 0.524),
        Body::Jupiter => (34.40438, 20.0202, 0.083091, 5.204267, 0.083),
        Body::Saturn => (49.9477, 317.0207, 0.033494, 9.5820172, 0.033),
        Body::Uranus => (313.23218, 141.0498, 0.011733, 19.189253, 0.012),
        Body::Neptune => (304.88003, 256.228, 0.005965, 30.070900, 0.006),
        Body::Pluto => (238.92881, 14.882, 0.003968, 39.481686, 0.004),
        // Earth-relative defaults; the Sun and Moon have dedicated series.
        Body::Sun | Body::Moon => (100.46435, 357.52911, 0.985609, 1.000001, 0.986),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sun_longitude_agrees_with_series_at_j2000() {
        let kepler = KeplerProvider::new();
        let series = super::super::SeriesProvider::new();

        let a = kepler.sun_position(JulianDay::J2000).await.unwrap();
        let b = series.sun_position(JulianDay::J2000).await.unwrap();

        assert!(
            (a.longitude - b.longitude).abs() < 0.1,
            "kepler {} vs series {}",
            a.longitude,
            b.longitude
        );
    }

    #[tokio::test]
    async fn narrow_range_is_enforced() {
        let provider = KeplerProvider::new();
        assert!(provider.covers(JulianDay::J2000));
        assert!(!provider.covers(JulianDay::new(1_000_000.0)));

        let err = provider
            .planetary_positions(JulianDay::new(1_000_000.0))
            .await
            .unwrap_err();
        assert!(matches!(err, EphemerisError::DataOutOfRange { .. }));
    }

    #[tokio::test]
    async fn moon_position_is_plausible() {
        let provider = KeplerProvider::new();
        let moon = provider.moon_position(JulianDay::J2000).await.unwrap();
        assert!((0.0..360.0).contains(&moon.longitude));
        assert!(moon.latitude.abs() <= 5.3);
        assert!(moon.distance > 356_000.0 && moon.distance < 407_000.0);
        assert!((0.0..=1.0).contains(&moon.phase));
    }

    #[tokio::test]
    async fn provider_info_names_the_method() {
        let provider = KeplerProvider::new();
        let info = provider.provider_info();
        assert_eq!(info.name, "kepler");
        assert!(info.source.contains("Keplerian"));
    }
}
