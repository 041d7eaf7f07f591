//! Error taxonomy shared by the FIFO, the poll API and the callback registry.
//!
//! Every error is reported synchronously to the caller that triggered it and is
//! never retried internally. None of them can reach the producer path: writes
//! into the ring always succeed.

use thiserror::Error;

use crate::dispatch::CallbackKind;

/// Errors returned by consumer-side operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimingError {
    /// A required output argument was not supplied.
    #[error("required output argument is missing")]
    NullArgument,

    /// The cursor cannot be moved by the requested increment.
    #[error("fifo index {index} cannot move by {incr}")]
    InvalidIndex { index: u64, incr: i64 },

    /// The requested logical index has not been written yet.
    #[error("fifo overrun: index {index} not yet written (head {head})")]
    Overrun { index: u64, head: u64 },

    /// The requested logical index has already been overwritten.
    #[error("fifo underrun: index {index} overwritten (head {head})")]
    Underrun { index: u64, head: u64 },

    /// The callback slot for this kind is already at capacity.
    #[error("{kind} callback registration refused: slot full")]
    Refused { kind: CallbackKind },

    /// No pulse or fiducial data can answer the query.
    #[error("no valid pulse data available")]
    Invalid,

    /// The event code is outside the configured event-code table.
    #[error("event code {0} is outside the configured range")]
    UnknownEventCode(u32),
}

impl TimingError {
    /// Stable negative status code for the integer-status API.
    pub const fn status(&self) -> i32 {
        match self {
            TimingError::NullArgument => -1,
            TimingError::InvalidIndex { .. } => -2,
            TimingError::Overrun { .. } => -3,
            TimingError::Underrun { .. } => -4,
            TimingError::Refused { .. } => -5,
            TimingError::Invalid => -6,
            TimingError::UnknownEventCode(_) => -7,
        }
    }

    /// True for the two FIFO position errors a client usually recovers from by re-syncing.
    pub const fn is_fifo_position(&self) -> bool {
        matches!(self, TimingError::Overrun { .. } | TimingError::Underrun { .. })
    }
}

/// Errors raised while validating a [`TimingConfig`](crate::TimingConfig).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("event_codes must be > 0")]
    NoEventCodes,
    #[error("fiducial event code {code} is outside 0..{event_codes}")]
    FiducialOutOfRange { code: u32, event_codes: usize },
    #[error("bsa callback capacity must be > 0")]
    ZeroBsaCapacity,
    #[error("completion policy requires no fields")]
    EmptyCompletionPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_distinct_and_negative() {
        let all = [
            TimingError::NullArgument,
            TimingError::InvalidIndex { index: 0, incr: -1 },
            TimingError::Overrun { index: 0, head: 0 },
            TimingError::Underrun { index: 0, head: 9 },
            TimingError::Refused {
                kind: CallbackKind::BsaPattern,
            },
            TimingError::Invalid,
            TimingError::UnknownEventCode(300),
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(a.status() < 0);
            for b in &all[i + 1..] {
                assert_ne!(a.status(), b.status());
            }
        }
    }

    #[test]
    fn display_names_the_position() {
        let err = TimingError::Underrun { index: 1, head: 6 };
        assert_eq!(err.to_string(), "fifo underrun: index 1 overwritten (head 6)");
        assert!(err.is_fifo_position());
        assert!(!TimingError::Invalid.is_fifo_position());
    }
}
