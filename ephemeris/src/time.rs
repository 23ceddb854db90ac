//! Calendar time ↔ Julian Day conversion.
//!
//! Both directions route through the Unix epoch, whose Julian Day is a
//! fixed constant, so the conversion is exact over chrono's proleptic
//! Gregorian / UTC domain. Out-of-range years are continued
//! mathematically, never clamped; range validation against a provider's
//! declared window is the caller's job.

use chrono::{DateTime, Utc};
use eph_core::JulianDay;

/// Julian Day of 1970-01-01 00:00:00 UTC.
pub const UNIX_EPOCH_JD: f64 = 2_440_587.5;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Convert a UTC timestamp to a Julian Day.
pub fn to_julian_day(t: DateTime<Utc>) -> JulianDay {
    let seconds = t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / 1e9;
    JulianDay::new(UNIX_EPOCH_JD + seconds / SECONDS_PER_DAY)
}

/// Convert a Julian Day back to a UTC timestamp.
///
/// Returns `None` only when the value falls outside chrono's representable
/// range (roughly ±262 000 years), far beyond any provider's declared data
/// window.
pub fn to_calendar_time(jd: JulianDay) -> Option<DateTime<Utc>> {
    let seconds = (jd.value() - UNIX_EPOCH_JD) * SECONDS_PER_DAY;
    let mut secs = seconds.floor() as i64;
    let mut nanos = ((seconds - seconds.floor()) * 1e9).round() as u32;
    if nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    DateTime::<Utc>::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn j2000_epoch() {
        let t = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        let jd = to_julian_day(t);
        assert!((jd.value() - 2_451_545.0).abs() < 1e-9);
    }

    #[test]
    fn unix_epoch() {
        let t = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert!((to_julian_day(t).value() - UNIX_EPOCH_JD).abs() < 1e-12);
    }

    #[test]
    fn known_dates() {
        // Meeus, Astronomical Algorithms, ch. 7 examples.
        let cases = [
            (1957, 10, 4, 19, 26, 24, 2_436_116.31),
            (1999, 1, 1, 0, 0, 0, 2_451_179.5),
            (1600, 1, 1, 0, 0, 0, 2_305_447.5),
            (2100, 1, 1, 12, 0, 0, 2_488_070.0),
        ];
        for (y, mo, d, h, mi, s, expected) in cases {
            let t = Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap();
            let jd = to_julian_day(t);
            assert!(
                (jd.value() - expected).abs() < 1e-5,
                "{y}-{mo}-{d}: got {jd}, expected {expected}"
            );
        }
    }

    #[test]
    fn round_trip_recovers_timestamp() {
        let t = Utc.with_ymd_and_hms(2024, 6, 21, 18, 30, 45).unwrap();
        let back = to_calendar_time(to_julian_day(t)).unwrap();
        assert!((back - t).num_milliseconds().abs() < 1_000);
    }

    #[test]
    fn fractional_day_places_noon() {
        // JD .0 is noon, .5 is midnight.
        let noon = to_calendar_time(JulianDay::new(2_451_545.0)).unwrap();
        assert_eq!(noon, Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap());
        let midnight = to_calendar_time(JulianDay::new(2_451_544.5)).unwrap();
        assert_eq!(midnight, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn far_out_of_range_is_none() {
        assert!(to_calendar_time(JulianDay::new(1e12)).is_none());
        assert!(to_calendar_time(JulianDay::new(-1e12)).is_none());
    }

    proptest! {
        #[test]
        fn round_trip_within_one_second(secs in -20_000_000_000i64..20_000_000_000i64) {
            // Roughly 1336 CE to 2603 CE.
            let t = DateTime::<Utc>::from_timestamp(secs, 0).unwrap();
            let back = to_calendar_time(to_julian_day(t)).unwrap();
            prop_assert!((back - t).num_milliseconds().abs() <= 1_000);
        }

        #[test]
        fn strictly_monotone(
            a in -20_000_000_000i64..20_000_000_000i64,
            delta in 1i64..1_000_000i64,
        ) {
            let t1 = DateTime::<Utc>::from_timestamp(a, 0).unwrap();
            let t2 = DateTime::<Utc>::from_timestamp(a + delta, 0).unwrap();
            prop_assert!(to_julian_day(t1) < to_julian_day(t2));
        }
    }
}
