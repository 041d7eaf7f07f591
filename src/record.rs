//! Plain-data records passed between the producer and its consumers.
//!
//! All records are `Copy`: the ring and the publish cells hand out copies, so a
//! value a reader holds can never change underneath it.

use core::fmt;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of event definitions; one bit per definition in every mask.
pub const EDEF_MAX: usize = 64;

/// Timestamp supplied by the external time base (seconds and nanoseconds past the EPICS epoch).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EpicsTimeStamp {
    pub sec_past_epoch: u32,
    pub nsec: u32,
}

impl EpicsTimeStamp {
    pub const fn new(sec_past_epoch: u32, nsec: u32) -> Self {
        Self {
            sec_past_epoch,
            nsec,
        }
    }

    /// The zero timestamp marks "never set".
    #[inline]
    pub const fn is_set(&self) -> bool {
        self.sec_past_epoch != 0 || self.nsec != 0
    }
}

impl fmt::Display for EpicsTimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec_past_epoch, self.nsec)
    }
}

/// Fiducial / pulse identifier. All-ones is reserved for "invalid".
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PulseId(pub u64);

impl PulseId {
    pub const INVALID: PulseId = PulseId(u64::MAX);

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u64::MAX
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Default for PulseId {
    fn default() -> Self {
        PulseId::INVALID
    }
}

impl fmt::Display for PulseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("invalid")
        }
    }
}

/// One hardware event arrival.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EventRecord {
    pub timestamp: EpicsTimeStamp,
    pub fiducial: PulseId,
    pub cpu_cycles: i64,
    pub event_code: u32,
}

impl EventRecord {
    pub const fn new(
        event_code: u32,
        timestamp: EpicsTimeStamp,
        fiducial: PulseId,
        cpu_cycles: i64,
    ) -> Self {
        Self {
            timestamp,
            fiducial,
            cpu_cycles,
            event_code,
        }
    }
}

/// Every mask and the timestamp belonging to exactly one beam pulse.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PulseSnapshot {
    pub pulse_id: PulseId,
    pub time_stamp: EpicsTimeStamp,
    pub edef_init_mask: u64,
    pub edef_active_mask: u64,
    pub edef_avg_done_mask: u64,
    pub edef_all_done_mask: u64,
    pub edef_update_mask: u64,
    pub edef_minor_mask: u64,
    pub edef_major_mask: u64,
}

impl PulseSnapshot {
    /// An empty snapshot for `pulse_id`; fields are filled in by contributions.
    pub fn for_pulse(pulse_id: PulseId) -> Self {
        Self {
            pulse_id,
            ..Self::default()
        }
    }

    /// Whether event definition `edef` is active on this pulse.
    #[inline]
    pub fn is_active(&self, edef: usize) -> bool {
        edef < EDEF_MAX && self.edef_active_mask & (1u64 << edef) != 0
    }
}

/// 360 Hz time slot, valid range `1..=6`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct TimeSlot(u8);

/// Raw value outside `1..=6`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("time slot {0} is outside 1..=6")]
pub struct InvalidTimeSlot(pub u8);

impl TryFrom<u8> for TimeSlot {
    type Error = InvalidTimeSlot;

    fn try_from(slot: u8) -> Result<Self, Self::Error> {
        TimeSlot::new(slot).ok_or(InvalidTimeSlot(slot))
    }
}

impl From<TimeSlot> for u8 {
    fn from(slot: TimeSlot) -> u8 {
        slot.0
    }
}

impl TimeSlot {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 6;

    pub const fn new(slot: u8) -> Option<Self> {
        if slot >= Self::MIN && slot <= Self::MAX {
            Some(TimeSlot(slot))
        } else {
            None
        }
    }

    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for TimeSlot {
    fn default() -> Self {
        TimeSlot(Self::MIN)
    }
}

/// Beam state for one 360 Hz cycle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BeamData {
    pub time_stamp: EpicsTimeStamp,
    pub time_slot: TimeSlot,
    pub beam_requested: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_id_sentinel() {
        assert!(!PulseId::INVALID.is_valid());
        assert_eq!(PulseId::default(), PulseId::INVALID);
        assert_eq!(PulseId::INVALID.get(), 0xFFFF_FFFF_FFFF_FFFF);
        assert!(PulseId(0).is_valid());
        assert_eq!(PulseId::INVALID.to_string(), "invalid");
    }

    #[test]
    fn time_slot_range() {
        assert!(TimeSlot::new(0).is_none());
        assert!(TimeSlot::new(7).is_none());
        assert_eq!(TimeSlot::new(4).map(TimeSlot::get), Some(4));
        assert_eq!(TimeSlot::try_from(7), Err(InvalidTimeSlot(7)));
        assert_eq!(TimeSlot::try_from(6).map(u8::from), Ok(6));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn time_slot_deserialization_checks_range() {
        assert_eq!(serde_json::from_str::<TimeSlot>("3").ok(), TimeSlot::new(3));
        assert!(serde_json::from_str::<TimeSlot>("0").is_err());
        assert!(serde_json::from_str::<TimeSlot>("7").is_err());
        assert_eq!(serde_json::to_string(&TimeSlot::new(5).unwrap()).unwrap(), "5");
    }

    #[test]
    fn timestamps_order_by_seconds_then_nanos() {
        let a = EpicsTimeStamp::new(10, 999_999_999);
        let b = EpicsTimeStamp::new(11, 0);
        assert!(a < b);
        assert!(!EpicsTimeStamp::default().is_set());
        assert_eq!(b.to_string(), "11.000000000");
    }

    #[test]
    fn active_bit_lookup() {
        let mut s = PulseSnapshot::for_pulse(PulseId(7));
        s.edef_active_mask = 1 << 63 | 1 << 2;
        assert!(s.is_active(2));
        assert!(s.is_active(63));
        assert!(!s.is_active(3));
        assert!(!s.is_active(64));
    }
}
