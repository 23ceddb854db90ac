//! Retrograde-motion analysis over manager-served positions.
//!
//! Works on the apparent angular speed in the planetary snapshots: a
//! negative speed is retrograde motion, a sign change brackets a station.

use chrono::{DateTime, Utc};
use eph_core::{Body, EphemerisError, EphemerisResult, JulianDay};
use std::sync::Arc;
use strum::Display;

use crate::manager::EphemerisManager;
use crate::time::to_calendar_time;

/// Apparent direction of motion along the ecliptic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MotionDirection {
    Direct,
    Retrograde,
    Stationary,
}

/// Which way motion flips at a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StationKind {
    /// Direct motion ends, retrograde begins.
    Retrograde,
    /// Retrograde motion ends, direct resumes.
    Direct,
}

/// A stationary point of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanetaryStation {
    pub body: Body,
    pub julian_day: JulianDay,
    pub time: Option<DateTime<Utc>>,
    pub longitude: f64,
    pub speed: f64,
    pub kind: StationKind,
}

/// A complete retrograde arc between two stations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrogradePeriod {
    pub body: Body,
    pub start_jd: JulianDay,
    pub end_jd: JulianDay,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub start_longitude: f64,
    pub end_longitude: f64,
    pub duration_days: f64,
    /// Arc length swept while retrograde, in degrees.
    pub retrograde_arc: f64,
}

/// Summary of a body's motion around one instant.
#[derive(Debug, Clone)]
pub struct MotionAnalysis {
    pub julian_day: JulianDay,
    pub body: Body,
    pub motion: MotionDirection,
    pub speed: f64,
    pub longitude: f64,
    pub is_near_station: bool,
    pub next_station: Option<PlanetaryStation>,
    pub current_period: Option<RetrogradePeriod>,
}

/// Speeds below this magnitude (°/day) count as stationary.
const STATIONARY_THRESHOLD: f64 = 0.01;
/// Speeds below this magnitude flag "near a station".
const NEAR_STATION_THRESHOLD: f64 = 0.05;
/// Station search sampling step in days (six hours).
const SAMPLE_INTERVAL: f64 = 0.25;
/// Bisection tolerance in days (~1.4 minutes).
const BISECTION_TOLERANCE: f64 = 0.001;
const BISECTION_MAX_ITERATIONS: usize = 20;

pub struct RetrogradeDetector {
    manager: Arc<EphemerisManager>,
}

impl RetrogradeDetector {
    pub fn new(manager: Arc<EphemerisManager>) -> Self {
        Self { manager }
    }

    async fn speed_of(&self, jd: JulianDay, body: Body) -> EphemerisResult<f64> {
        Ok(self.manager.planetary_positions(jd).await?.body(body).speed)
    }

    /// Classify the motion of `body` at `jd`.
    pub async fn motion_at(&self, jd: JulianDay, body: Body) -> EphemerisResult<MotionDirection> {
        let speed = self.speed_of(jd, body).await?;
        Ok(classify(speed))
    }

    /// Find the next stationary point within `search_days` of `start_jd`.
    pub async fn find_station(
        &self,
        start_jd: JulianDay,
        body: Body,
        search_days: u32,
    ) -> EphemerisResult<PlanetaryStation> {
        let max_samples = (f64::from(search_days) / SAMPLE_INTERVAL) as usize;

        let mut prev_speed = self.speed_of(start_jd, body).await?;
        let mut prev_jd = start_jd;

        for i in 1..max_samples {
            let current_jd = start_jd + i as f64 * SAMPLE_INTERVAL;
            let speed = match self.speed_of(current_jd, body).await {
                Ok(speed) => speed,
                // Skip gaps (e.g. a sample outside a provider's range)
                // and keep searching.
                Err(_) => continue,
            };

            if prev_speed * speed < 0.0 || speed.abs() < STATIONARY_THRESHOLD {
                let station_jd = self.refine_station(prev_jd, current_jd, body).await?;
                let station = self.manager.planetary_positions(station_jd).await?;
                let position = station.body(body);

                let kind = if prev_speed > 0.0 && speed < 0.0 {
                    StationKind::Retrograde
                } else {
                    StationKind::Direct
                };

                tracing::debug!(%body, jd = %station_jd, kind = %kind, "station located");
                return Ok(PlanetaryStation {
                    body,
                    julian_day: station_jd,
                    time: to_calendar_time(station_jd),
                    longitude: position.longitude,
                    speed: position.speed,
                    kind,
                });
            }

            prev_speed = speed;
            prev_jd = current_jd;
        }

        Err(EphemerisError::CalculationFailed {
            reason: format!("no {body} station found within {search_days} days"),
        })
    }

    /// Bisect a speed sign change down to ~1.4 minutes.
    async fn refine_station(
        &self,
        mut lo: JulianDay,
        mut hi: JulianDay,
        body: Body,
    ) -> EphemerisResult<JulianDay> {
        for _ in 0..BISECTION_MAX_ITERATIONS {
            if hi - lo < BISECTION_TOLERANCE {
                break;
            }
            let mid = JulianDay::new((lo.value() + hi.value()) / 2.0);
            let mid_speed = self.speed_of(mid, body).await?;
            let lo_speed = self.speed_of(lo, body).await?;

            if lo_speed * mid_speed < 0.0 {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        Ok(JulianDay::new((lo.value() + hi.value()) / 2.0))
    }

    /// Reconstruct the retrograde period containing `jd`.
    ///
    /// Errors unless the body is actually retrograde at `jd`.
    pub async fn find_retrograde_period(
        &self,
        jd: JulianDay,
        body: Body,
    ) -> EphemerisResult<RetrogradePeriod> {
        if self.motion_at(jd, body).await? != MotionDirection::Retrograde {
            return Err(EphemerisError::CalculationFailed {
                reason: format!("{body} is not retrograde at {jd}"),
            });
        }

        let start = self.find_station_backward(jd, body, 200).await?;
        let end = self.find_station_forward(jd, body, 200).await?;

        let mut retrograde_arc = (end.longitude - start.longitude).abs();
        if retrograde_arc > 180.0 {
            retrograde_arc = 360.0 - retrograde_arc;
        }

        Ok(RetrogradePeriod {
            body,
            start_jd: start.julian_day,
            end_jd: end.julian_day,
            start_time: start.time,
            end_time: end.time,
            start_longitude: start.longitude,
            end_longitude: end.longitude,
            duration_days: end.julian_day - start.julian_day,
            retrograde_arc,
        })
    }

    async fn find_station_backward(
        &self,
        jd: JulianDay,
        body: Body,
        max_days: u32,
    ) -> EphemerisResult<PlanetaryStation> {
        for i in 0..max_days {
            let search_jd = jd - f64::from(i);
            match self.motion_at(search_jd, body).await {
                Ok(MotionDirection::Direct | MotionDirection::Stationary) => {
                    return self.find_station(search_jd, body, 10).await;
                }
                Ok(MotionDirection::Retrograde) | Err(_) => {}
            }
        }
        Err(EphemerisError::CalculationFailed {
            reason: format!("no {body} station found in {max_days} days searching backward"),
        })
    }

    async fn find_station_forward(
        &self,
        jd: JulianDay,
        body: Body,
        max_days: u32,
    ) -> EphemerisResult<PlanetaryStation> {
        for i in 0..max_days {
            let search_jd = jd + f64::from(i);
            match self.motion_at(search_jd, body).await {
                Ok(MotionDirection::Direct | MotionDirection::Stationary) => {
                    // Walk back one day so the bracketing sweep starts in
                    // the retrograde arc.
                    let from = search_jd - 1.0;
                    return self.find_station(from, body, 10).await;
                }
                Ok(MotionDirection::Retrograde) | Err(_) => {}
            }
        }
        Err(EphemerisError::CalculationFailed {
            reason: format!("no {body} station found in {max_days} days searching forward"),
        })
    }

    /// Full motion summary at `jd`.
    pub async fn analyze_motion(
        &self,
        jd: JulianDay,
        body: Body,
    ) -> EphemerisResult<MotionAnalysis> {
        let positions = self.manager.planetary_positions(jd).await?;
        let position = positions.body(body);
        let motion = classify(position.speed);

        let next_station = self.find_station(jd, body, 400).await.ok();
        let current_period = if motion == MotionDirection::Retrograde {
            self.find_retrograde_period(jd, body).await.ok()
        } else {
            None
        };

        Ok(MotionAnalysis {
            julian_day: jd,
            body,
            motion,
            speed: position.speed,
            longitude: position.longitude,
            is_near_station: position.speed.abs() < NEAR_STATION_THRESHOLD,
            next_station,
            current_period,
        })
    }

    /// All planets currently in retrograde motion.
    pub async fn retrograde_bodies(&self, jd: JulianDay) -> EphemerisResult<Vec<Body>> {
        let positions = self.manager.planetary_positions(jd).await?;
        Ok(Body::PLANETS
            .into_iter()
            .filter(|body| classify(positions.body(*body).speed) == MotionDirection::Retrograde)
            .collect())
    }

    /// Check detection against an externally known retrograde period by
    /// sampling its midpoint.
    pub async fn validate_known_period(
        &self,
        body: Body,
        known_start: JulianDay,
        known_end: JulianDay,
    ) -> EphemerisResult<bool> {
        let mid = JulianDay::new((known_start.value() + known_end.value()) / 2.0);
        Ok(self.motion_at(mid, body).await? == MotionDirection::Retrograde)
    }
}

fn classify(speed: f64) -> MotionDirection {
    if speed.abs() < STATIONARY_THRESHOLD {
        MotionDirection::Stationary
    } else if speed < 0.0 {
        MotionDirection::Retrograde
    } else {
        MotionDirection::Direct
    }
}
