use thiserror::Error;

/// Errors produced by providers and the manager.
///
/// The transient/permanent split drives the manager's retry and failover
/// decisions: transient errors are retried on the same provider before
/// failing over, permanent errors fail over immediately.
#[derive(Debug, Clone, Error)]
pub enum EphemerisError {
    #[error("provider unavailable: {reason}")]
    ProviderUnavailable { reason: String },

    #[error("request timed out after {timeout_ms}ms")]
    RequestTimeout { timeout_ms: u64 },

    #[error("julian day {jd} outside valid range [{start_jd}, {end_jd}]")]
    DataOutOfRange { jd: f64, start_jd: f64, end_jd: f64 },

    #[error("calculation failed: {reason}")]
    CalculationFailed { reason: String },

    #[error("request cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("all providers failed for {operation}: [{}]", format_attempts(.attempts))]
    AllProvidersFailed {
        operation: String,
        attempts: Vec<ProviderAttempt>,
    },
}

/// One failed attempt in the manager's provider walk, kept so the terminal
/// error can name every provider it tried and why each one failed.
#[derive(Debug, Clone)]
pub struct ProviderAttempt {
    pub provider: String,
    pub error: String,
}

fn format_attempts(attempts: &[ProviderAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.provider, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl EphemerisError {
    /// Transient errors are worth retrying against the same provider.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EphemerisError::ProviderUnavailable { .. } | EphemerisError::RequestTimeout { .. }
        )
    }

    /// Permanent errors trigger immediate failover, no retry.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            EphemerisError::DataOutOfRange { .. }
                | EphemerisError::CalculationFailed { .. }
                | EphemerisError::AllProvidersFailed { .. }
        )
    }

    /// Caller-initiated termination; never retried, never failed over.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EphemerisError::Cancelled { .. })
    }

    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EphemerisError::ProviderUnavailable { .. } => "unavailable",
            EphemerisError::RequestTimeout { .. } => "timeout",
            EphemerisError::DataOutOfRange { .. } => "out_of_range",
            EphemerisError::CalculationFailed { .. } => "calculation_failed",
            EphemerisError::Cancelled { .. } => "cancelled",
            EphemerisError::AllProvidersFailed { .. } => "exhausted",
        }
    }
}

pub type EphemerisResult<T> = Result<T, EphemerisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_disjoint() {
        let errors = [
            EphemerisError::ProviderUnavailable {
                reason: "not initialized".to_string(),
            },
            EphemerisError::RequestTimeout { timeout_ms: 500 },
            EphemerisError::DataOutOfRange {
                jd: 0.0,
                start_jd: 1.0,
                end_jd: 2.0,
            },
            EphemerisError::CalculationFailed {
                reason: "singular matrix".to_string(),
            },
            EphemerisError::Cancelled {
                reason: "deadline elapsed".to_string(),
            },
        ];

        for err in &errors {
            let classes = [err.is_transient(), err.is_permanent(), err.is_cancellation()];
            assert_eq!(
                classes.iter().filter(|c| **c).count(),
                1,
                "exactly one class for {err}"
            );
        }
    }

    #[test]
    fn exhaustion_lists_every_attempt() {
        let err = EphemerisError::AllProvidersFailed {
            operation: "sun_position".to_string(),
            attempts: vec![
                ProviderAttempt {
                    provider: "primary".to_string(),
                    error: "provider unavailable: offline".to_string(),
                },
                ProviderAttempt {
                    provider: "fallback".to_string(),
                    error: "calculation failed: nan".to_string(),
                },
            ],
        };

        let rendered = err.to_string();
        assert!(rendered.contains("sun_position"));
        assert!(rendered.contains("primary"));
        assert!(rendered.contains("fallback"));
        assert!(err.is_permanent());
    }

    #[test]
    fn out_of_range_names_the_window() {
        let err = EphemerisError::DataOutOfRange {
            jd: 100.0,
            start_jd: 1000.0,
            end_jd: 2000.0,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("100"));
        assert!(rendered.contains("1000"));
    }
}
