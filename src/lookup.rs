//! Timestamp to fiducial lookup over a retained arrival window.

use crate::record::{EpicsTimeStamp, EventRecord, PulseId};
use crate::seq_ring::SeqRing;

/// Find the fiducial whose arrival carried exactly `ts`.
///
/// Scans newest to oldest over every retained record; timestamps are not assumed
/// to be ordered, since the time base may step backwards. Anything older than the
/// retained window, or overwritten mid-scan, yields [`PulseId::INVALID`].
pub fn fiducial_for_timestamp<const N: usize>(
    ring: &SeqRing<EventRecord, N>,
    ts: EpicsTimeStamp,
) -> PulseId {
    if !ts.is_set() {
        return PulseId::INVALID;
    }
    let head = ring.head();
    let oldest = SeqRing::<EventRecord, N>::oldest_for(head);
    for index in (oldest..head).rev() {
        let Ok(record) = ring.read(index) else {
            break;
        };
        if record.timestamp == ts {
            return record.fiducial;
        }
    }
    PulseId::INVALID
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_with<const N: usize>(fids: core::ops::Range<u64>) -> SeqRing<EventRecord, N> {
        let ring = SeqRing::new();
        {
            let w = ring.writer().unwrap();
            for fid in fids {
                w.push(EventRecord::new(1, EpicsTimeStamp::new(1_000, fid as u32), PulseId(fid), 0));
            }
        }
        ring
    }

    #[test]
    fn exact_match_inside_window() {
        let ring = ring_with::<8>(100..110);
        assert_eq!(
            fiducial_for_timestamp(&ring, EpicsTimeStamp::new(1_000, 105)),
            PulseId(105)
        );
    }

    #[test]
    fn older_than_window_is_invalid() {
        let ring = ring_with::<8>(100..110);
        // 100 and 101 were overwritten.
        assert_eq!(
            fiducial_for_timestamp(&ring, EpicsTimeStamp::new(1_000, 101)),
            PulseId::INVALID
        );
        assert_eq!(
            fiducial_for_timestamp(&ring, EpicsTimeStamp::new(1_000, 102)),
            PulseId(102)
        );
    }

    #[test]
    fn match_behind_a_backwards_time_step() {
        let ring = SeqRing::<EventRecord, 8>::new();
        {
            let w = ring.writer().unwrap();
            w.push(EventRecord::new(1, EpicsTimeStamp::new(1_000, 500), PulseId(10), 0));
            w.push(EventRecord::new(1, EpicsTimeStamp::new(999, 0), PulseId(11), 0));
        }
        assert_eq!(
            fiducial_for_timestamp(&ring, EpicsTimeStamp::new(1_000, 500)),
            PulseId(10)
        );
        assert_eq!(
            fiducial_for_timestamp(&ring, EpicsTimeStamp::new(999, 0)),
            PulseId(11)
        );
    }

    #[test]
    fn no_match_and_unset() {
        let ring = ring_with::<8>(0..4);
        assert_eq!(
            fiducial_for_timestamp(&ring, EpicsTimeStamp::new(2_000, 0)),
            PulseId::INVALID
        );
        assert_eq!(
            fiducial_for_timestamp(&ring, EpicsTimeStamp::default()),
            PulseId::INVALID
        );
        let empty = SeqRing::<EventRecord, 8>::new();
        assert_eq!(
            fiducial_for_timestamp(&empty, EpicsTimeStamp::new(1_000, 1)),
            PulseId::INVALID
        );
    }
}
