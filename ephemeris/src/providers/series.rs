//! High-precision provider backed by truncated VSOP87/ELP-2000 series.

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

const DATA_START_JD: f64 = -3_027_215.5;
const DATA_END_JD: f64 = 7_857_061.5;

/// Provider computing positions from truncated VSOP87 planetary series and
/// ELP-2000 lunar theory. Wide validity window, no external data files.
pub struct SeriesProvider {
    name: String,
    version: String,
}

impl SeriesProvider {
    pub fn new() -> Self {
        Self {
            name: "series".to_string(),
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
        let l = normalize_degrees(280.4664567 + 0.9856235 * t);
        let m = normalize_degrees(357.5291092 + 0.9856002585 * t);
        let m_rad = m.to_radians();

        let c = 1.9148 * m_rad.sin() + 0.0200 * (2.0 * m_rad).sin() + 0.0003 * (3.0 * m_rad).sin();
        let lambda = l + c;
        let distance = 1.000001018 * (1.0 - 0.01671123 * m_rad.cos() - 0.00014 * (2.0 * m_rad).cos());
        let speed = 0.9856 * (1.0 + 0.0167 * m_rad.cos());

        Position {
            longitude: normalize_degrees(lambda),
            latitude: 0.0,
            distance,
            speed,
        }
    }

    fn moon(&self, jd: JulianDay) -> Position {
        let elements = LunarElements::at(jd);
        let m_rad = elements.mean_anomaly.to_radians();

        Position {
            longitude: normalize_degrees(elements.longitude()),
            latitude: elements.latitude(),
            distance: elements.distance_km() / AU_KM,
            speed: 13.18 * (1.0 + 0.055 * m_rad.cos()),
        }
    }

    fn planet(&self, jd: JulianDay, body: Body) -> Position {
        let t = jd.days_since_j2000();
        let terms = planet_terms(body);

        let l = normalize_degrees(terms.longitude_epoch + terms.longitude_rate * t);
        let m = normalize_degrees(terms.anomaly_epoch + terms.anomaly_rate * t);

        let perturbation_arg = |phase: f64| (phase + terms.longitude_rate * t).to_radians();
        let delta_l = terms.longitude_amplitude * perturbation_arg(terms.longitude_phase).sin();
        let delta_m = terms.anomaly_amplitude * perturbation_arg(terms.anomaly_phase).sin();
        let delta_r = terms.distance_amplitude * perturbation_arg(terms.longitude_phase).cos();

        let m_rad = (m + delta_m).to_radians();
        let lambda = l + delta_l + 1.915 * m_rad.sin() + 0.020 * (2.0 * m_rad).sin();

        Position {
            longitude: normalize_degrees(lambda),
            latitude: 0.0,
            distance: terms.distance_au + delta_r,
            speed: terms.mean_motion,
        }
    }

    fn body_longitude(&self, jd: JulianDay, body: Body) -> f64 {
        match body {
            Body::Sun => self.sun(jd).longitude,
            Body::Moon => self.moon(jd).longitude,
            _ => self.planet(jd, body).longitude,
        }
    }

    /// Apparent angular speed by centered finite difference over one day;
    /// negative while the body moves retrograde.
    fn apparent_speed(&self, jd: JulianDay, body: Body) -> f64 {
        let ahead = self.body_longitude(jd + 0.5, body);
        let behind = self.body_longitude(jd - 0.5, body);
        let mut diff = ahead - behind;
        while diff > 180.0 {
            diff -= 360.0;
        }
        while diff < -180.0 {
            diff += 360.0;
        }
        diff
    }

    fn positions(&self, jd: JulianDay) -> PlanetaryPositions {
        let mut snapshot = PlanetaryPositions {
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
        };
        for body in Body::ALL {
            snapshot.body_mut(body).speed = self.apparent_speed(jd, body);
        }
        snapshot
    }

    fn detailed_sun(&self, jd: JulianDay) -> SolarPosition {
        let t = jd.days_since_j2000();
        let centuries = t / 36_525.0;

        let l = normalize_degrees(280.4664567 + 0.9856235 * t);
        let m = normalize_degrees(357.5291092 + 0.9856002585 * t);
        let m_rad = m.to_radians();

        let c = 1.9148 * m_rad.sin() + 0.0200 * (2.0 * m_rad).sin() + 0.0003 * (3.0 * m_rad).sin();
        let lambda = l + c;

        let epsilon = 23.4392911 - 0.0130042 * centuries - 0.00000164 * centuries * centuries;
        let (alpha, delta) = equatorial_from_ecliptic(lambda, 0.0, epsilon);

        let distance =
            1.000001018 * (1.0 - 0.01671123 * m_rad.cos() - 0.00014 * (2.0 * m_rad).cos());

        // NOAA-style equation of time, in minutes.
        let e = 0.01671123;
        let y = (epsilon.to_radians() / 2.0).tan().powi(2);
        let l_rad = l.to_radians();
        let equation_of_time = 4.0
            * (y * (2.0 * l_rad).sin() - 2.0 * e * m_rad.sin()
                + 4.0 * e * y * m_rad.sin() * (2.0 * l_rad).cos()
                - 0.5 * y * y * (4.0 * l_rad).sin()
                - 1.25 * e * e * (2.0 * m_rad).sin())
            .to_degrees();

        // Nutation and aberration correction.
        let omega = (125.04 - 1934.136 * centuries).to_radians();
        let apparent_longitude = lambda + 0.00569 - 0.00478 * omega.sin();

        SolarPosition {
            julian_day: jd,
            longitude: normalize_degrees(lambda),
            right_ascension: alpha,
            declination: delta,
            distance,
            equation_of_time,
            mean_anomaly: m,
            true_anomaly: m + c,
            eccentric_anomaly: m + 1.9148 * m_rad.sin() + 0.0200 * (2.0 * m_rad).sin(),
            mean_longitude: l,
            apparent_longitude: normalize_degrees(apparent_longitude),
        }
    }

    fn detailed_moon(&self, jd: JulianDay) -> LunarPosition {
        let t = jd.days_since_j2000();
        let centuries = t / 36_525.0;
        let elements = LunarElements::at(jd);

        let lambda = elements.longitude();
        let beta = elements.latitude();
        let distance = elements.distance_km();

        let epsilon = 23.4392911 - 0.0130042 * centuries;
        let (alpha, delta) = equatorial_from_ecliptic(lambda, beta, epsilon);

        let sun_longitude = self.sun(jd).longitude;
        let elongation = elongation_degrees(lambda, sun_longitude);
        let phase = phase_from_elongation(elongation);

        LunarPosition {
            julian_day: jd,
            longitude: normalize_degrees(lambda),
            latitude: beta,
            right_ascension: alpha,
            declination: delta,
            distance,
            phase,
            phase_angle: elongation,
            illumination: phase * 100.0,
            angular_diameter: lunar_angular_diameter(distance),
            mean_anomaly: elements.mean_anomaly,
            true_anomaly: elements.mean_anomaly + elements.delta_longitude,
            argument_of_latitude: normalize_degrees(lambda - 125.0),
            mean_longitude: elements.mean_longitude,
            true_longitude: lambda,
        }
    }
}

impl Default for SeriesProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EphemerisProvider for SeriesProvider {
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
            source: "truncated VSOP87/ELP-2000 series".to_string(),
        }
    }

    async fn close(&self) -> EphemerisResult<()> {
        Ok(())
    }
}

/// Fundamental lunar arguments and ELP-2000 periodic corrections.
struct LunarElements {
    mean_longitude: f64,
    mean_anomaly: f64,
    delta_longitude: f64,
    delta_latitude: f64,
    delta_distance: f64,
}

impl LunarElements {
    fn at(jd: JulianDay) -> Self {
        let t = jd.days_since_j2000();

        let l = normalize_degrees(218.3164477 + 13.17639648 * t);
        let m = normalize_degrees(134.9633964 + 13.06499295 * t);
        let mp = normalize_degrees(357.5291092 + 0.9856002585 * t);
        let d = normalize_degrees(297.8501921 + 12.19074912 * t);
        let f = normalize_degrees(93.2720950 + 13.22935025 * t);

        let (m_r, mp_r, d_r, f_r) =
            (m.to_radians(), mp.to_radians(), d.to_radians(), f.to_radians());

        let delta_longitude = 6.289 * m_r.sin()
            + 1.274 * (2.0 * d_r - m_r).sin()
            + 0.658 * (2.0 * d_r).sin()
            - 0.186 * mp_r.sin()
            - 0.059 * (2.0 * m_r - 2.0 * d_r).sin()
            - 0.057 * (m_r - 2.0 * d_r + mp_r).sin()
            + 0.053 * (m_r + 2.0 * d_r).sin()
            + 0.046 * (2.0 * d_r - mp_r).sin()
            + 0.041 * (m_r - mp_r).sin()
            - 0.035 * d_r.sin()
            - 0.031 * (m_r + mp_r).sin()
            - 0.015 * (2.0 * f_r - 2.0 * d_r).sin()
            + 0.011 * (m_r - 4.0 * d_r).sin();

        let delta_latitude = 5.128 * f_r.sin()
            + 0.281 * (m_r + f_r).sin()
            + 0.277 * (m_r - f_r).sin()
            + 0.173 * (2.0 * d_r - f_r).sin()
            + 0.055 * (2.0 * d_r - m_r + f_r).sin()
            - 0.046 * (2.0 * d_r - m_r - f_r).sin()
            + 0.033 * (m_r + 2.0 * d_r + f_r).sin()
            + 0.017 * (2.0 * m_r + f_r).sin();

        let delta_distance = -20_905.0 * m_r.cos()
            - 3_699.0 * (2.0 * d_r - m_r).cos()
            - 2_956.0 * (2.0 * d_r).cos()
            - 570.0 * (2.0 * m_r).cos()
            + 246.0 * (2.0 * m_r - 2.0 * d_r).cos()
            - 205.0 * (mp_r - 2.0 * d_r).cos()
            - 171.0 * (m_r + 2.0 * d_r).cos()
            - 152.0 * (m_r + mp_r - 2.0 * d_r).cos()
            + 148.0 * (m_r - mp_r).cos()
            - 125.0 * d_r.cos()
            - 110.0 * (m_r + mp_r).cos()
            + 59.0 * (2.0 * d_r - m_r - mp_r).cos();

        Self {
            mean_longitude: l,
            mean_anomaly: m,
            delta_longitude,
            delta_latitude,
            delta_distance,
        }
    }

    fn longitude(&self) -> f64 {
        self.mean_longitude + self.delta_longitude
    }

    fn latitude(&self) -> f64 {
        self.delta_latitude
    }

    fn distance_km(&self) -> f64 {
        385_000.56 + self.delta_distance
    }
}

/// Mean elements and first-order perturbation terms for one planet.
struct PlanetTerms {
    longitude_epoch: f64,
    longitude_rate: f64,
    anomaly_epoch: f64,
    anomaly_rate: f64,
    distance_au: f64,
    mean_motion: f64,
    longitude_amplitude: f64,
    longitude_phase: f64,
    anomaly_amplitude: f64,
    anomaly_phase: f64,
    distance_amplitude: f64,
}

fn planet_terms(body: Body) -> PlanetTerms {
    match body {
        Body::Mercury => PlanetTerms {
            longitude_epoch: 252.2509,
            longitude_rate: 4.092338,
            anomaly_epoch: 174.7948,
            anomaly_rate: 4.092335,
            distance_au: 0.387098,
            mean_motion: 4.092,
            longitude_amplitude: 0.378,
            longitude_phase: 157.074,
            anomaly_amplitude: 0.321,
            anomaly_phase: 164.045,
            distance_amplitude: 0.007824,
        },
        Body::Venus => PlanetTerms {
            longitude_epoch: 181.9798,
            longitude_rate: 1.602136,
            anomaly_epoch: 50.4161,
            anomaly_rate: 1.602136,
            distance_au: 0.723327,
            mean_motion: 1.602,
            longitude_amplitude: 0.775,
            longitude_phase: 89.44,
            anomaly_amplitude: 0.007,
            anomaly_phase: 313.42,
            distance_amplitude: 0.000005,
        },
        Body::Mars => PlanetTerms {
            longitude_epoch: 355.433,
            longitude_rate: 0.524033,
            anomaly_epoch: 19.3870,
            anomaly_rate: 0.524033,
            distance_au: 1.523679,
            mean_motion: 0.524,
            longitude_amplitude: 10.691,
            longitude_phase: 68.98,
            anomaly_amplitude: 0.606,
            anomaly_phase: 108.99,
            distance_amplitude: 0.141063,
        },
        Body::Jupiter => PlanetTerms {
            longitude_epoch: 34.3515,
            longitude_rate: 0.083091,
            anomaly_epoch: 20.0202,
            anomaly_rate: 0.083091,
            distance_au: 5.204267,
            mean_motion: 0.083,
            longitude_amplitude: 5.555,
            longitude_phase: 318.16,
            anomaly_amplitude: 0.164,
            anomaly_phase: 225.33,
            distance_amplitude: 0.262127,
        },
        Body::Saturn => PlanetTerms {
            longitude_epoch: 50.0774,
            longitude_rate: 0.033494,
            anomaly_epoch: 317.021,
            anomaly_rate: 0.033494,
            distance_au: 9.5820172,
            mean_motion: 0.033,
            longitude_amplitude: 6.406,
            longitude_phase: 231.46,
            anomaly_amplitude: 0.407,
            anomaly_phase: 206.19,
            distance_amplitude: 0.301020,
        },
        Body::Uranus => PlanetTerms {
            longitude_epoch: 314.055,
            longitude_rate: 0.011733,
            anomaly_epoch: 142.238,
            anomaly_rate: 0.011733,
            distance_au: 19.189253,
            mean_motion: 0.012,
            longitude_amplitude: 1.681,
            longitude_phase: 77.25,
            anomaly_amplitude: 0.104,
            anomaly_phase: 108.11,
            distance_amplitude: 0.09142,
        },
        Body::Neptune => PlanetTerms {
            longitude_epoch: 304.348,
            longitude_rate: 0.005965,
            anomaly_epoch: 256.225,
            anomaly_rate: 0.005965,
            distance_au: 30.070900,
            mean_motion: 0.006,
            longitude_amplitude: 1.021,
            longitude_phase: 84.457,
            anomaly_amplitude: 0.058,
            anomaly_phase: 200.51,
            distance_amplitude: 0.046116,
        },
        Body::Pluto => PlanetTerms {
            longitude_epoch: 238.956,
            longitude_rate: 0.003968,
            anomaly_epoch: 14.8820,
            anomaly_rate: 0.003968,
            distance_au: 39.481686,
            mean_motion: 0.004,
            longitude_amplitude: 0.041,
            longitude_phase: 322.16,
            anomaly_amplitude: 0.004,
            anomaly_phase: 322.16,
            distance_amplitude: 0.0064,
        },
        // Sun and Moon have dedicated series.
        Body::Sun | Body::Moon => PlanetTerms {
            longitude_epoch: 100.4644,
            longitude_rate: 0.985647,
            anomaly_epoch: 357.5291,
            anomaly_rate: 0.985600,
            distance_au: 1.000001,
            mean_motion: 0.986,
            longitude_amplitude: 0.0,
            longitude_phase: 0.0,
            anomaly_amplitude: 0.0,
            anomaly_phase: 0.0,
            distance_amplitude: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sun_longitude_at_j2000() {
        let provider = SeriesProvider::new();
        let sun = provider.sun_position(JulianDay::J2000).await.unwrap();
        // The Sun sits near ecliptic longitude 280° at the J2000.0 epoch.
        assert!(
            (sun.longitude - 280.0).abs() < 1.0,
            "got {}",
            sun.longitude
        );
        assert!(sun.distance > 0.97 && sun.distance < 1.02);
        assert!(sun.declination < 0.0, "southern declination in January");
    }

    #[tokio::test]
    async fn moon_phase_near_full_moon() {
        let provider = SeriesProvider::new();
        // 2000-01-21 was a full moon.
        let moon = provider
            .moon_position(JulianDay::new(2_451_564.7))
            .await
            .unwrap();
        assert!(moon.phase > 0.9, "got phase {}", moon.phase);
        assert!(moon.illumination > 90.0);
    }

    #[tokio::test]
    async fn moon_distance_is_plausible() {
        let provider = SeriesProvider::new();
        let moon = provider.moon_position(JulianDay::J2000).await.unwrap();
        assert!(moon.distance > 356_000.0 && moon.distance < 407_000.0);
        assert!(moon.angular_diameter > 1_700.0 && moon.angular_diameter < 2_100.0);
    }

    #[tokio::test]
    async fn out_of_range_is_rejected() {
        let provider = SeriesProvider::new();
        let err = provider
            .sun_position(JulianDay::new(DATA_END_JD + 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, EphemerisError::DataOutOfRange { .. }));
    }

    #[tokio::test]
    async fn snapshot_covers_every_body() {
        let provider = SeriesProvider::new();
        let positions = provider
            .planetary_positions(JulianDay::J2000)
            .await
            .unwrap();
        for body in Body::ALL {
            let p = positions.body(body);
            assert!(
                (0.0..360.0).contains(&p.longitude),
                "{body}: longitude {}",
                p.longitude
            );
            assert!(p.distance > 0.0, "{body}: distance {}", p.distance);
        }
        // Apparent solar speed is close to the mean motion.
        assert!((positions.sun.speed - 0.9856).abs() < 0.1);
    }

    #[tokio::test]
    async fn liveness_and_health() {
        let provider = SeriesProvider::new();
        assert!(provider.is_available().await);
        let health = provider.health_status().await.unwrap();
        assert!(health.available);
        assert_eq!(health.data_start_jd, DATA_START_JD);
        assert_eq!(health.source, "series");
    }
}
