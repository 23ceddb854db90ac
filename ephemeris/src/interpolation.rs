//! Position interpolation across a window of daily manager samples.
//!
//! Useful when a caller needs many intra-day positions: a handful of
//! cached daily samples plus interpolation is far cheaper than a provider
//! call per query. Longitudes are unwrapped across the 0/360° boundary
//! before fitting.

use eph_core::{Body, EphemerisError, EphemerisResult, JulianDay, PlanetaryPositions, Position};
use std::sync::Arc;

use crate::manager::EphemerisManager;
use crate::providers::normalize_degrees;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMethod {
    Linear,
    Lagrange,
    CubicSpline,
}

#[derive(Debug, Clone, Copy)]
pub struct InterpolationConfig {
    pub method: InterpolationMethod,
    /// Number of daily sample points for polynomial methods (3–7 works
    /// well); linear interpolation always uses two.
    pub order: usize,
    /// Acceptable combined error in degrees for `validate`.
    pub tolerance: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            method: InterpolationMethod::CubicSpline,
            order: 5,
            tolerance: 0.0001,
        }
    }
}

struct SamplePoint {
    jd: f64,
    position: Position,
}

pub struct Interpolator {
    manager: Arc<EphemerisManager>,
    config: InterpolationConfig,
}

impl Interpolator {
    pub fn new(manager: Arc<EphemerisManager>, config: InterpolationConfig) -> Self {
        Self { manager, config }
    }

    pub fn config(&self) -> InterpolationConfig {
        self.config
    }

    pub fn set_method(&mut self, method: InterpolationMethod) {
        self.config.method = method;
    }

    /// Interpolated position of `body` at `jd`.
    pub async fn position(&self, jd: JulianDay, body: Body) -> EphemerisResult<Position> {
        let points = self.sample_points(jd, body).await?;

        let mut position = match self.config.method {
            InterpolationMethod::Linear => linear(&points, jd.value())?,
            InterpolationMethod::Lagrange => lagrange(&points, jd.value())?,
            InterpolationMethod::CubicSpline => cubic_spline(&points, jd.value())?,
        };

        position.longitude = normalize_degrees(position.longitude);
        Ok(position)
    }

    /// Interpolated snapshot of every tracked body at `jd`.
    pub async fn all_positions(&self, jd: JulianDay) -> EphemerisResult<PlanetaryPositions> {
        let mut snapshot = PlanetaryPositions {
            julian_day: jd,
            sun: Position::default(),
            moon: Position::default(),
            mercury: Position::default(),
            venus: Position::default(),
            mars: Position::default(),
            jupiter: Position::default(),
            saturn: Position::default(),
            uranus: Position::default(),
            neptune: Position::default(),
            pluto: Position::default(),
        };
        for body in Body::ALL {
            *snapshot.body_mut(body) = self.position(jd, body).await?;
        }
        Ok(snapshot)
    }

    /// Compare interpolation against direct computation; returns a
    /// weighted error in degrees.
    pub async fn validate(&self, jd: JulianDay, body: Body) -> EphemerisResult<f64> {
        let interpolated = self.position(jd, body).await?;
        let actual = *self.manager.planetary_positions(jd).await?.body(body);

        let mut longitude_error = (interpolated.longitude - actual.longitude).abs();
        if longitude_error > 180.0 {
            longitude_error = 360.0 - longitude_error;
        }
        let latitude_error = (interpolated.latitude - actual.latitude).abs();
        let distance_error = if actual.distance != 0.0 {
            (interpolated.distance - actual.distance).abs() / actual.distance * 100.0
        } else {
            0.0
        };

        let total = longitude_error + latitude_error * 0.5 + distance_error * 0.1;
        tracing::debug!(
            %jd,
            %body,
            longitude_error,
            latitude_error,
            distance_error,
            within_tolerance = total <= self.config.tolerance,
            "interpolation validated"
        );
        Ok(total)
    }

    /// Daily samples centered on the target day, fetched through the
    /// manager so they are cached and shared across interpolations.
    async fn sample_points(&self, jd: JulianDay, body: Body) -> EphemerisResult<Vec<SamplePoint>> {
        let count = match self.config.method {
            InterpolationMethod::Linear => 2,
            _ => self.config.order.max(2),
        };

        let offset = (count - 1) as f64 / 2.0;
        let start = jd.value() - offset;

        let mut points = Vec::with_capacity(count);
        for i in 0..count {
            let sample_jd = JulianDay::new(start + i as f64);
            let positions = self.manager.planetary_positions(sample_jd).await?;
            points.push(SamplePoint {
                jd: sample_jd.value(),
                position: *positions.body(body),
            });
        }
        points.sort_by(|a, b| a.jd.total_cmp(&b.jd));
        Ok(points)
    }
}

fn too_few_points(method: &str) -> EphemerisError {
    EphemerisError::CalculationFailed {
        reason: format!("need at least 2 points for {method} interpolation"),
    }
}

fn linear(points: &[SamplePoint], jd: f64) -> EphemerisResult<Position> {
    if points.len() < 2 {
        return Err(too_few_points("linear"));
    }

    // Bracketing pair, or the nearest edge pair outside the sampled span.
    let idx = points
        .windows(2)
        .position(|w| w[0].jd <= jd && jd <= w[1].jd)
        .unwrap_or(if jd < points[0].jd { 0 } else { points.len() - 2 });
    let (p0, p1) = (&points[idx], &points[idx + 1]);

    let t = (jd - p0.jd) / (p1.jd - p0.jd);

    let (lon0, lon1) = unwrap_pair(p0.position.longitude, p1.position.longitude);

    Ok(Position {
        longitude: lon0 + t * (lon1 - lon0),
        latitude: p0.position.latitude + t * (p1.position.latitude - p0.position.latitude),
        distance: p0.position.distance + t * (p1.position.distance - p0.position.distance),
        speed: p0.position.speed + t * (p1.position.speed - p0.position.speed),
    })
}

fn lagrange(points: &[SamplePoint], jd: f64) -> EphemerisResult<Position> {
    let n = points.len();
    if n < 2 {
        return Err(too_few_points("Lagrange"));
    }

    let longitudes = unwrap_series(points.iter().map(|p| p.position.longitude));

    let mut longitude = 0.0;
    let mut latitude = 0.0;
    let mut distance = 0.0;
    let mut speed = 0.0;

    for j in 0..n {
        let mut term = 1.0;
        for m in 0..n {
            if m != j {
                term *= (jd - points[m].jd) / (points[j].jd - points[m].jd);
            }
        }
        longitude += term * longitudes[j];
        latitude += term * points[j].position.latitude;
        distance += term * points[j].position.distance;
        speed += term * points[j].position.speed;
    }

    Ok(Position {
        longitude,
        latitude,
        distance,
        speed,
    })
}

fn cubic_spline(points: &[SamplePoint], jd: f64) -> EphemerisResult<Position> {
    if points.len() < 4 {
        // Not enough points for a stable spline.
        return lagrange(points, jd);
    }

    Ok(Position {
        longitude: spline_component(points, jd, |p| p.position.longitude, true),
        latitude: spline_component(points, jd, |p| p.position.latitude, false),
        distance: spline_component(points, jd, |p| p.position.distance, false),
        speed: spline_component(points, jd, |p| p.position.speed, false),
    })
}

/// Natural cubic spline through the sampled component, evaluated at `jd`.
fn spline_component(
    points: &[SamplePoint],
    jd: f64,
    component: impl Fn(&SamplePoint) -> f64,
    cyclic: bool,
) -> f64 {
    let n = points.len();

    let x: Vec<f64> = points.iter().map(|p| p.jd).collect();
    let y: Vec<f64> = if cyclic {
        unwrap_series(points.iter().map(&component))
    } else {
        points.iter().map(&component).collect()
    };

    let idx = x
        .windows(2)
        .position(|w| w[0] <= jd && jd <= w[1])
        .unwrap_or(n - 2)
        .min(n - 2);

    let h: Vec<f64> = (0..n - 1).map(|j| x[j + 1] - x[j]).collect();

    let mut alpha = vec![0.0; n - 1];
    for j in 1..n - 1 {
        alpha[j] = (3.0 / h[j]) * (y[j + 1] - y[j]) - (3.0 / h[j - 1]) * (y[j] - y[j - 1]);
    }

    let mut l = vec![0.0; n];
    let mut mu = vec![0.0; n];
    let mut z = vec![0.0; n];
    l[0] = 1.0;

    for j in 1..n - 1 {
        l[j] = 2.0 * (x[j + 1] - x[j - 1]) - h[j - 1] * mu[j - 1];
        mu[j] = h[j] / l[j];
        z[j] = (alpha[j] - h[j - 1] * z[j - 1]) / l[j];
    }
    l[n - 1] = 1.0;

    let mut c = vec![0.0; n];
    let mut b = vec![0.0; n - 1];
    let mut d = vec![0.0; n - 1];

    for j in (0..n - 1).rev() {
        c[j] = z[j] - mu[j] * c[j + 1];
        b[j] = (y[j + 1] - y[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
        d[j] = (c[j + 1] - c[j]) / (3.0 * h[j]);
    }

    let dx = jd - x[idx];
    y[idx] + b[idx] * dx + c[idx] * dx * dx + d[idx] * dx * dx * dx
}

/// Unwrap two adjacent longitudes across the 0/360° boundary.
fn unwrap_pair(lon0: f64, lon1: f64) -> (f64, f64) {
    if (lon1 - lon0).abs() > 180.0 {
        if lon0 > lon1 {
            (lon0, lon1 + 360.0)
        } else {
            (lon0 + 360.0, lon1)
        }
    } else {
        (lon0, lon1)
    }
}

/// Unwrap a monotone-sampled longitude series so consecutive values never
/// jump more than 180°.
fn unwrap_series(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::new();
    for value in values {
        let adjusted = match out.last() {
            Some(prev) => {
                let mut v = value;
                while v - prev > 180.0 {
                    v -= 360.0;
                }
                while prev - v > 180.0 {
                    v += 360.0;
                }
                v
            }
            None => value,
        };
        out.push(adjusted);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SeriesProvider;
    use config::EphemerisConfig;

    async fn series_manager() -> Arc<EphemerisManager> {
        let manager = EphemerisManager::new(EphemerisConfig::default());
        manager
            .register_provider("series", Arc::new(SeriesProvider::new()))
            .await;
        Arc::new(manager)
    }

    fn point(jd: f64, longitude: f64) -> SamplePoint {
        SamplePoint {
            jd,
            position: Position {
                longitude,
                latitude: 0.0,
                distance: 1.0,
                speed: 1.0,
            },
        }
    }

    #[test]
    fn linear_midpoint() {
        let points = vec![point(0.0, 10.0), point(1.0, 20.0)];
        let result = linear(&points, 0.5).unwrap();
        assert!((result.longitude - 15.0).abs() < 1e-9);
    }

    #[test]
    fn linear_handles_wraparound() {
        let points = vec![point(0.0, 358.0), point(1.0, 2.0)];
        let result = linear(&points, 0.5).unwrap();
        assert!((normalize_degrees(result.longitude) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn lagrange_reproduces_grid_values() {
        let points = vec![
            point(0.0, 10.0),
            point(1.0, 11.0),
            point(2.0, 12.5),
            point(3.0, 14.5),
            point(4.0, 17.0),
        ];
        let result = lagrange(&points, 2.0).unwrap();
        assert!((result.longitude - 12.5).abs() < 1e-9);
    }

    #[test]
    fn spline_reproduces_grid_values() {
        let points = vec![
            point(0.0, 10.0),
            point(1.0, 11.0),
            point(2.0, 12.5),
            point(3.0, 14.5),
            point(4.0, 17.0),
        ];
        let result = cubic_spline(&points, 3.0).unwrap();
        assert!((result.longitude - 14.5).abs() < 1e-9);
    }

    #[test]
    fn spline_falls_back_to_lagrange_below_four_points() {
        let points = vec![point(0.0, 10.0), point(1.0, 20.0), point(2.0, 30.0)];
        let result = cubic_spline(&points, 1.5).unwrap();
        assert!((result.longitude - 25.0).abs() < 1e-9);
    }

    #[test]
    fn too_few_points_is_an_error() {
        let points = vec![point(0.0, 10.0)];
        assert!(linear(&points, 0.5).is_err());
        assert!(lagrange(&points, 0.5).is_err());
    }

    #[tokio::test]
    async fn interpolated_sun_tracks_direct_computation() {
        let manager = series_manager().await;
        let interpolator = Interpolator::new(manager.clone(), InterpolationConfig::default());

        let jd = JulianDay::J2000 + 0.37;
        let interpolated = interpolator.position(jd, Body::Sun).await.unwrap();
        let direct = *manager.planetary_positions(jd).await.unwrap().body(Body::Sun);

        let mut error = (interpolated.longitude - direct.longitude).abs();
        if error > 180.0 {
            error = 360.0 - error;
        }
        assert!(error < 0.01, "interpolation error {error}°");
    }

    #[tokio::test]
    async fn validate_reports_small_error_for_smooth_bodies() {
        let manager = series_manager().await;
        let interpolator = Interpolator::new(manager, InterpolationConfig::default());

        let error = interpolator
            .validate(JulianDay::J2000 + 0.25, Body::Jupiter)
            .await
            .unwrap();
        assert!(error < 0.05, "error {error}");
    }

    #[tokio::test]
    async fn all_positions_covers_every_body() {
        let manager = series_manager().await;
        let interpolator = Interpolator::new(
            manager,
            InterpolationConfig {
                method: InterpolationMethod::Linear,
                ..InterpolationConfig::default()
            },
        );

        let snapshot = interpolator
            .all_positions(JulianDay::J2000 + 0.5)
            .await
            .unwrap();
        for body in Body::ALL {
            assert!(
                (0.0..360.0).contains(&snapshot.body(body).longitude),
                "{body}"
            );
        }
    }
}
