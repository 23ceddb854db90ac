//! Built-in position providers.
//!
//! `SeriesProvider` is the high-precision default; `KeplerProvider` is the
//! coarser fallback with a narrower validity window. `MockProvider` is a
//! fully scriptable provider for tests and downstream consumers.

pub mod kepler;
pub mod mock;
pub mod series;

pub use kepler::KeplerProvider;
pub use mock::MockProvider;
pub use series::SeriesProvider;

/// Kilometres per astronomical unit.
pub(crate) const AU_KM: f64 = 149_597_870.7;

/// Normalize an angle in degrees to [0, 360).
pub(crate) fn normalize_degrees(angle: f64) -> f64 {
    let result = angle % 360.0;
    if result < 0.0 { result + 360.0 } else { result }
}

/// Fold the separation of two longitudes into [0, 180].
pub(crate) fn elongation_degrees(lon_a: f64, lon_b: f64) -> f64 {
    let mut elongation = (lon_a - lon_b).abs();
    if elongation > 180.0 {
        elongation = 360.0 - elongation;
    }
    elongation
}

/// Ecliptic (λ, β) to equatorial (α, δ), all in degrees.
pub(crate) fn equatorial_from_ecliptic(lambda: f64, beta: f64, epsilon: f64) -> (f64, f64) {
    let (lambda_r, beta_r, epsilon_r) = (lambda.to_radians(), beta.to_radians(), epsilon.to_radians());

    let alpha = (epsilon_r.cos() * lambda_r.sin() - epsilon_r.sin() * beta_r.tan())
        .atan2(lambda_r.cos())
        .to_degrees();
    let delta = (epsilon_r.sin() * lambda_r.sin() * beta_r.cos()
        + epsilon_r.cos() * beta_r.sin())
    .asin()
    .to_degrees();

    (normalize_degrees(alpha), delta)
}

/// Illuminated fraction of the lunar disc from the Sun–Moon elongation.
pub(crate) fn phase_from_elongation(elongation: f64) -> f64 {
    (1.0 - elongation.to_radians().cos()) / 2.0
}

/// Lunar angular diameter in arcseconds at a geocentric distance in km;
/// 1873″ at the mean distance, scaling inversely with distance.
pub(crate) fn lunar_angular_diameter(distance_km: f64) -> f64 {
    1_873.0 * (385_000.56 / distance_km)
}
