//! Capability trait implemented by every position provider.

use async_trait::async_trait;

use crate::error::EphemerisResult;
use crate::types::{
    HealthStatus, JulianDay, LunarPosition, PlanetaryPositions, ProviderInfo, SolarPosition
};

/// A pluggable source of astronomical positions.
///
/// Providers are read-only after construction: they may hold immutable
/// reference data (a loaded ephemeris table) but must not accumulate
/// per-call mutable state visible across calls. For a `JulianDay` inside
/// the declared [`data_range`](Self::data_range) a provider must never
/// panic; outside it the contract is an explicit
/// [`DataOutOfRange`](crate::EphemerisError::DataOutOfRange) error.
#[async_trait]
pub trait EphemerisProvider: Send + Sync {
    /// Positions of all tracked bodies at `jd`.
    async fn planetary_positions(&self, jd: JulianDay) -> EphemerisResult<PlanetaryPositions>;

    /// Detailed Sun position at `jd`.
    async fn sun_position(&self, jd: JulianDay) -> EphemerisResult<SolarPosition>;

    /// Detailed Moon position at `jd`.
    async fn moon_position(&self, jd: JulianDay) -> EphemerisResult<LunarPosition>;

    /// Cheap liveness probe; must return within a short bounded interval.
    async fn is_available(&self) -> bool;

    /// Declared validity window as `(start_jd, end_jd)`.
    fn data_range(&self) -> (JulianDay, JulianDay);

    /// Current health snapshot.
    async fn health_status(&self) -> EphemerisResult<HealthStatus>;

    /// Static metadata.
    fn provider_info(&self) -> ProviderInfo;

    /// Release any held resources. Called once by the owning manager.
    async fn close(&self) -> EphemerisResult<()>;

    /// Whether `jd` falls inside the declared validity window.
    fn covers(&self, jd: JulianDay) -> bool {
        let (start, end) = self.data_range();
        start <= jd && jd <= end
    }
}
