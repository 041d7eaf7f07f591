//! Timing core configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::assembler::CompletionPolicy;
use crate::error::ConfigError;
use crate::fifo::DEFAULT_EVENT_CODES;

/// Configuration for a [`TimingCore`](crate::TimingCore).
///
/// The ring depth is the core's const parameter; everything else lives here.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimingConfig {
    /// Size of the event-code table.
    pub event_codes: usize,

    /// Event code whose arrivals carry the beam fiducial.
    pub fiducial_event_code: u32,

    /// Which pattern fields close a pulse.
    pub completion: CompletionPolicy,

    /// How many BSA pattern callbacks may register.
    pub bsa_callback_capacity: usize,
}

impl TimingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_codes(mut self, event_codes: usize) -> Self {
        self.event_codes = event_codes;
        self
    }

    pub fn with_fiducial_event_code(mut self, code: u32) -> Self {
        self.fiducial_event_code = code;
        self
    }

    pub fn with_completion(mut self, completion: CompletionPolicy) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_bsa_callback_capacity(mut self, capacity: usize) -> Self {
        self.bsa_callback_capacity = capacity;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_codes == 0 {
            return Err(ConfigError::NoEventCodes);
        }
        if self.fiducial_event_code as usize >= self.event_codes {
            return Err(ConfigError::FiducialOutOfRange {
                code: self.fiducial_event_code,
                event_codes: self.event_codes,
            });
        }
        if self.bsa_callback_capacity == 0 {
            return Err(ConfigError::ZeroBsaCapacity);
        }
        if self.completion.required().is_empty() {
            return Err(ConfigError::EmptyCompletionPolicy);
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            event_codes: DEFAULT_EVENT_CODES,
            fiducial_event_code: 1,
            completion: CompletionPolicy::TimeStamp,
            bsa_callback_capacity: 1,
        }
    }
}
