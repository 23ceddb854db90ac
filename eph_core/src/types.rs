use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::time::Duration;
use strum::{Display, EnumString};

/// Continuous count of days since the Julian epoch; the fractional part
/// encodes time of day. The uniform time axis for every computation in
/// this subsystem, independent of calendar and timezone conventions.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JulianDay(f64);

impl JulianDay {
    /// J2000.0 epoch: 2000-01-01 12:00 UTC.
    pub const J2000: JulianDay = JulianDay(2_451_545.0);

    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> f64 {
        self.0
    }

    /// Days elapsed since the J2000.0 epoch (negative before it).
    pub fn days_since_j2000(&self) -> f64 {
        self.0 - Self::J2000.0
    }
}

impl From<f64> for JulianDay {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl Add<f64> for JulianDay {
    type Output = JulianDay;

    fn add(self, days: f64) -> JulianDay {
        JulianDay(self.0 + days)
    }
}

impl AddAssign<f64> for JulianDay {
    fn add_assign(&mut self, days: f64) {
        self.0 += days;
    }
}

impl Sub<f64> for JulianDay {
    type Output = JulianDay;

    fn sub(self, days: f64) -> JulianDay {
        JulianDay(self.0 - days)
    }
}

impl SubAssign<f64> for JulianDay {
    fn sub_assign(&mut self, days: f64) {
        self.0 -= days;
    }
}

impl Sub for JulianDay {
    type Output = f64;

    fn sub(self, other: JulianDay) -> f64 {
        self.0 - other.0
    }
}

impl std::fmt::Display for JulianDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JD {:.6}", self.0)
    }
}

/// Tracked celestial bodies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Body {
    Sun,
    Moon,
    Mercury,
    Venus,
    Mars,
    Jupiter,
    Saturn,
    Uranus,
    Neptune,
    Pluto,
}

impl Body {
    /// Every tracked body, Sun and Moon first.
    pub const ALL: [Body; 10] = [
        Body::Sun,
        Body::Moon,
        Body::Mercury,
        Body::Venus,
        Body::Mars,
        Body::Jupiter,
        Body::Saturn,
        Body::Uranus,
        Body::Neptune,
        Body::Pluto,
    ];

    /// The planets proper (everything but Sun and Moon).
    pub const PLANETS: [Body; 8] = [
        Body::Mercury,
        Body::Venus,
        Body::Mars,
        Body::Jupiter,
        Body::Saturn,
        Body::Uranus,
        Body::Neptune,
        Body::Pluto,
    ];
}

/// A celestial body's geocentric ecliptic position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Ecliptic longitude in degrees, normalized to [0, 360).
    pub longitude: f64,
    /// Ecliptic latitude in degrees.
    pub latitude: f64,
    /// Distance from Earth in AU.
    pub distance: f64,
    /// Apparent angular speed in degrees per day (negative while retrograde).
    pub speed: f64,
}

/// One snapshot of every tracked body at a single Julian Day.
///
/// Immutable once computed; created on cache miss, stored, eventually
/// evicted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanetaryPositions {
    pub julian_day: JulianDay,
    pub sun: Position,
    pub moon: Position,
    pub mercury: Position,
    pub venus: Position,
    pub mars: Position,
    pub jupiter: Position,
    pub saturn: Position,
    pub uranus: Position,
    pub neptune: Position,
    pub pluto: Position,
}

impl PlanetaryPositions {
    pub fn body(&self, body: Body) -> &Position {
        match body {
            Body::Sun => &self.sun,
            Body::Moon => &self.moon,
            Body::Mercury => &self.mercury,
            Body::Venus => &self.venus,
            Body::Mars => &self.mars,
            Body::Jupiter => &self.jupiter,
            Body::Saturn => &self.saturn,
            Body::Uranus => &self.uranus,
            Body::Neptune => &self.neptune,
            Body::Pluto => &self.pluto,
        }
    }

    pub fn body_mut(&mut self, body: Body) -> &mut Position {
        match body {
            Body::Sun => &mut self.sun,
            Body::Moon => &mut self.moon,
            Body::Mercury => &mut self.mercury,
            Body::Venus => &mut self.venus,
            Body::Mars => &mut self.mars,
            Body::Jupiter => &mut self.jupiter,
            Body::Saturn => &mut self.saturn,
            Body::Uranus => &mut self.uranus,
            Body::Neptune => &mut self.neptune,
            Body::Pluto => &mut self.pluto,
        }
    }
}

/// Detailed solar position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarPosition {
    pub julian_day: JulianDay,
    /// Ecliptic longitude in degrees.
    pub longitude: f64,
    /// Right ascension in degrees.
    pub right_ascension: f64,
    /// Declination in degrees.
    pub declination: f64,
    /// Distance from Earth in AU.
    pub distance: f64,
    /// Equation of time in minutes.
    pub equation_of_time: f64,
    /// Mean anomaly in degrees.
    pub mean_anomaly: f64,
    /// True anomaly in degrees.
    pub true_anomaly: f64,
    /// Eccentric anomaly in degrees.
    pub eccentric_anomaly: f64,
    /// Mean longitude in degrees.
    pub mean_longitude: f64,
    /// Apparent longitude in degrees (nutation and aberration applied).
    pub apparent_longitude: f64,
}

/// Detailed lunar position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LunarPosition {
    pub julian_day: JulianDay,
    /// Ecliptic longitude in degrees.
    pub longitude: f64,
    /// Ecliptic latitude in degrees.
    pub latitude: f64,
    /// Right ascension in degrees.
    pub right_ascension: f64,
    /// Declination in degrees.
    pub declination: f64,
    /// Distance from Earth in km.
    pub distance: f64,
    /// Phase fraction: 0 = new, 0.5 = half, 1 = full.
    pub phase: f64,
    /// Phase angle in degrees.
    pub phase_angle: f64,
    /// Illuminated fraction of the disc as a percentage.
    pub illumination: f64,
    /// Angular diameter in arcseconds.
    pub angular_diameter: f64,
    /// Mean anomaly in degrees.
    pub mean_anomaly: f64,
    /// True anomaly in degrees.
    pub true_anomaly: f64,
    /// Argument of latitude in degrees.
    pub argument_of_latitude: f64,
    /// Mean longitude in degrees.
    pub mean_longitude: f64,
    /// True longitude in degrees.
    pub true_longitude: f64,
}

/// Health-state machine for a registered provider.
///
/// Transitions happen only on monitor probes or shutdown; the request path
/// reads the current state and never writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderState {
    /// Never probed yet.
    Unknown,
    /// Last probe succeeded.
    Healthy,
    /// Last probe failed or timed out.
    Unhealthy,
    /// The owning manager has been closed.
    Stopped,
}

/// Point-in-time health record for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub available: bool,
    pub last_check: DateTime<Utc>,
    pub data_start_jd: f64,
    pub data_end_jd: f64,
    pub response_time: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub version: String,
    pub source: String,
}

/// Static provider metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub version: String,
    /// Label of the underlying data source or theory.
    pub source: String,
}
