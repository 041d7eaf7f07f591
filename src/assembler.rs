//! Per-pulse snapshot assembly.
//!
//! Pattern fields for a pulse arrive one at a time. The assembler accumulates them
//! in a single in-progress record and hands back a finished [`PulseSnapshot`] once
//! the [`CompletionPolicy`] is satisfied. A record that is still incomplete when a
//! newer pulse starts is discarded, never published.
//!
//! The assembler is plain owned state driven by the producer; publication and
//! dispatch are done by the caller.

use core::ops::BitOr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::record::{EpicsTimeStamp, PulseId, PulseSnapshot};

/// One partial update for a pulse.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PatternField {
    InitMask(u64),
    ActiveMask(u64),
    AvgDoneMask(u64),
    AllDoneMask(u64),
    UpdateMask(u64),
    MinorMask(u64),
    MajorMask(u64),
    TimeStamp(EpicsTimeStamp),
}

impl PatternField {
    pub const fn bit(&self) -> FieldSet {
        match self {
            PatternField::InitMask(_) => FieldSet::INIT_MASK,
            PatternField::ActiveMask(_) => FieldSet::ACTIVE_MASK,
            PatternField::AvgDoneMask(_) => FieldSet::AVG_DONE_MASK,
            PatternField::AllDoneMask(_) => FieldSet::ALL_DONE_MASK,
            PatternField::UpdateMask(_) => FieldSet::UPDATE_MASK,
            PatternField::MinorMask(_) => FieldSet::MINOR_MASK,
            PatternField::MajorMask(_) => FieldSet::MAJOR_MASK,
            PatternField::TimeStamp(_) => FieldSet::TIME_STAMP,
        }
    }

    fn apply(self, snapshot: &mut PulseSnapshot) {
        match self {
            PatternField::InitMask(m) => snapshot.edef_init_mask = m,
            PatternField::ActiveMask(m) => snapshot.edef_active_mask = m,
            PatternField::AvgDoneMask(m) => snapshot.edef_avg_done_mask = m,
            PatternField::AllDoneMask(m) => snapshot.edef_all_done_mask = m,
            PatternField::UpdateMask(m) => snapshot.edef_update_mask = m,
            PatternField::MinorMask(m) => snapshot.edef_minor_mask = m,
            PatternField::MajorMask(m) => snapshot.edef_major_mask = m,
            PatternField::TimeStamp(ts) => snapshot.time_stamp = ts,
        }
    }
}

/// Set of [`PatternField`] kinds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FieldSet(u16);

impl FieldSet {
    pub const EMPTY: FieldSet = FieldSet(0);
    pub const INIT_MASK: FieldSet = FieldSet(1 << 0);
    pub const ACTIVE_MASK: FieldSet = FieldSet(1 << 1);
    pub const AVG_DONE_MASK: FieldSet = FieldSet(1 << 2);
    pub const ALL_DONE_MASK: FieldSet = FieldSet(1 << 3);
    pub const UPDATE_MASK: FieldSet = FieldSet(1 << 4);
    pub const MINOR_MASK: FieldSet = FieldSet(1 << 5);
    pub const MAJOR_MASK: FieldSet = FieldSet(1 << 6);
    pub const TIME_STAMP: FieldSet = FieldSet(1 << 7);
    pub const ALL: FieldSet = FieldSet(0xFF);

    #[inline]
    pub const fn contains(self, other: FieldSet) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for FieldSet {
    type Output = FieldSet;

    fn bitor(self, rhs: FieldSet) -> FieldSet {
        FieldSet(self.0 | rhs.0)
    }
}

/// Which arrivals close a pulse.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CompletionPolicy {
    /// The pulse closes when its timestamp arrives.
    #[default]
    TimeStamp,
    /// Every mask and the timestamp must arrive.
    AllFields,
    /// A custom set of required fields.
    Fields(FieldSet),
}

impl CompletionPolicy {
    pub const fn required(&self) -> FieldSet {
        match self {
            CompletionPolicy::TimeStamp => FieldSet::TIME_STAMP,
            CompletionPolicy::AllFields => FieldSet::ALL,
            CompletionPolicy::Fields(set) => *set,
        }
    }
}

/// Result of one contribution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Assembly {
    /// Accepted; the pulse is still open.
    Pending,
    /// The pulse closed with this snapshot.
    Complete(PulseSnapshot),
    /// Ignored: the pulse is already closed or older than the one being built.
    Stale,
    /// Ignored: a whole snapshot is missing a field the policy requires.
    Incomplete,
}

#[derive(Copy, Clone, Debug)]
struct Partial {
    seen: FieldSet,
    snapshot: PulseSnapshot,
}

/// Builds one pulse at a time and closes it per policy.
#[derive(Debug)]
pub struct PulseAssembler {
    policy: CompletionPolicy,
    building: Option<Partial>,
    last_closed: PulseId,
    discarded: u64,
}

impl PulseAssembler {
    pub fn new(policy: CompletionPolicy) -> Self {
        Self {
            policy,
            building: None,
            last_closed: PulseId::INVALID,
            discarded: 0,
        }
    }

    /// Continue after a previously published pulse, so ordering survives a restart.
    pub fn resume_after(policy: CompletionPolicy, last_closed: PulseId) -> Self {
        Self {
            last_closed,
            ..Self::new(policy)
        }
    }

    #[inline]
    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    /// Last pulse that completed, or `INVALID` before the first.
    #[inline]
    pub fn last_closed(&self) -> PulseId {
        self.last_closed
    }

    /// Number of incomplete pulses discarded so far.
    #[inline]
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Pulse currently being assembled, if any.
    pub fn in_progress(&self) -> Option<PulseId> {
        self.building.map(|p| p.snapshot.pulse_id)
    }

    fn is_closed(&self, pulse_id: PulseId) -> bool {
        !pulse_id.is_valid() || (self.last_closed.is_valid() && pulse_id <= self.last_closed)
    }

    /// Fold one field into the record for `pulse_id`.
    pub fn contribute(&mut self, pulse_id: PulseId, field: PatternField) -> Assembly {
        if self.is_closed(pulse_id) {
            tracing::debug!(%pulse_id, last = %self.last_closed, "stale pattern contribution");
            return Assembly::Stale;
        }

        let partial = match &mut self.building {
            Some(p) if p.snapshot.pulse_id == pulse_id => p,
            Some(p) if p.snapshot.pulse_id > pulse_id => {
                tracing::debug!(%pulse_id, building = %p.snapshot.pulse_id, "stale pattern contribution");
                return Assembly::Stale;
            }
            slot => {
                if let Some(old) = slot.take() {
                    self.discarded += 1;
                    tracing::debug!(
                        pulse_id = %old.snapshot.pulse_id,
                        next = %pulse_id,
                        "discarding incomplete pulse"
                    );
                }
                slot.insert(Partial {
                    seen: FieldSet::EMPTY,
                    snapshot: PulseSnapshot::for_pulse(pulse_id),
                })
            }
        };

        field.apply(&mut partial.snapshot);
        partial.seen = partial.seen | field.bit();

        if partial.seen.contains(self.policy.required()) {
            let snapshot = partial.snapshot;
            self.building = None;
            self.last_closed = pulse_id;
            Assembly::Complete(snapshot)
        } else {
            Assembly::Pending
        }
    }

    /// Close a whole pulse at once, subject to the same ordering and policy rules.
    ///
    /// Masks are always present in a whole snapshot; only an unset timestamp can
    /// leave it short of the policy.
    pub fn complete(&mut self, snapshot: PulseSnapshot) -> Assembly {
        let pulse_id = snapshot.pulse_id;
        if self.policy.required().contains(FieldSet::TIME_STAMP) && !snapshot.time_stamp.is_set() {
            tracing::debug!(%pulse_id, "pattern snapshot without timestamp");
            return Assembly::Incomplete;
        }
        if self.is_closed(pulse_id) || self.in_progress().is_some_and(|b| b > pulse_id) {
            tracing::debug!(%pulse_id, "stale pattern snapshot");
            return Assembly::Stale;
        }
        if let Some(old) = self.building.take() {
            if old.snapshot.pulse_id != pulse_id {
                self.discarded += 1;
                tracing::debug!(pulse_id = %old.snapshot.pulse_id, next = %pulse_id, "discarding incomplete pulse");
            }
        }
        self.last_closed = pulse_id;
        Assembly::Complete(snapshot)
    }
}

impl Default for PulseAssembler {
    fn default() -> Self {
        Self::new(CompletionPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(n: u32) -> EpicsTimeStamp {
        EpicsTimeStamp::new(500, n)
    }

    #[test]
    fn closes_on_timestamp_by_default() {
        let mut asm = PulseAssembler::default();
        assert_eq!(asm.contribute(PulseId(1), PatternField::ActiveMask(0b101)), Assembly::Pending);
        assert_eq!(asm.contribute(PulseId(1), PatternField::MinorMask(0b1)), Assembly::Pending);

        let Assembly::Complete(s) = asm.contribute(PulseId(1), PatternField::TimeStamp(ts(1))) else {
            panic!("pulse 1 should close");
        };
        assert_eq!(s.pulse_id, PulseId(1));
        assert_eq!(s.edef_active_mask, 0b101);
        assert_eq!(s.edef_minor_mask, 0b1);
        assert_eq!(s.time_stamp, ts(1));
        assert_eq!(asm.last_closed(), PulseId(1));
        assert_eq!(asm.in_progress(), None);
    }

    #[test]
    fn incomplete_pulse_is_discarded() {
        let mut asm = PulseAssembler::default();
        assert_eq!(asm.contribute(PulseId(100), PatternField::ActiveMask(1)), Assembly::Pending);
        assert_eq!(asm.contribute(PulseId(101), PatternField::InitMask(2)), Assembly::Pending);
        assert_eq!(asm.discarded(), 1);

        let Assembly::Complete(s) = asm.contribute(PulseId(101), PatternField::TimeStamp(ts(2))) else {
            panic!("pulse 101 should close");
        };
        // Nothing from pulse 100 leaks into pulse 101.
        assert_eq!(s.edef_active_mask, 0);
        assert_eq!(s.edef_init_mask, 2);

        // Pulse 100 can never be completed afterwards.
        assert_eq!(asm.contribute(PulseId(100), PatternField::TimeStamp(ts(1))), Assembly::Stale);
    }

    #[test]
    fn late_fields_for_closed_pulse_are_stale() {
        let mut asm = PulseAssembler::default();
        assert!(matches!(
            asm.contribute(PulseId(5), PatternField::TimeStamp(ts(5))),
            Assembly::Complete(_)
        ));
        assert_eq!(asm.contribute(PulseId(5), PatternField::MajorMask(1)), Assembly::Stale);
        assert_eq!(asm.contribute(PulseId(4), PatternField::MajorMask(1)), Assembly::Stale);
        assert_eq!(asm.contribute(PulseId::INVALID, PatternField::MajorMask(1)), Assembly::Stale);
    }

    #[test]
    fn older_pulse_does_not_displace_newer_build() {
        let mut asm = PulseAssembler::default();
        assert_eq!(asm.contribute(PulseId(10), PatternField::InitMask(1)), Assembly::Pending);
        assert_eq!(asm.contribute(PulseId(9), PatternField::TimeStamp(ts(9))), Assembly::Stale);
        assert_eq!(asm.in_progress(), Some(PulseId(10)));
        assert_eq!(asm.discarded(), 0);
    }

    #[test]
    fn all_fields_policy_waits_for_every_mask() {
        let mut asm = PulseAssembler::new(CompletionPolicy::AllFields);
        let fields = [
            PatternField::TimeStamp(ts(3)),
            PatternField::InitMask(1),
            PatternField::ActiveMask(2),
            PatternField::AvgDoneMask(3),
            PatternField::AllDoneMask(4),
            PatternField::UpdateMask(5),
            PatternField::MinorMask(6),
        ];
        for f in fields {
            assert_eq!(asm.contribute(PulseId(3), f), Assembly::Pending);
        }
        let Assembly::Complete(s) = asm.contribute(PulseId(3), PatternField::MajorMask(7)) else {
            panic!("pulse 3 should close");
        };
        assert_eq!(s.edef_all_done_mask, 4);
        assert_eq!(s.edef_major_mask, 7);
    }

    #[test]
    fn custom_policy() {
        let policy = CompletionPolicy::Fields(FieldSet::ACTIVE_MASK | FieldSet::TIME_STAMP);
        let mut asm = PulseAssembler::new(policy);
        assert_eq!(asm.contribute(PulseId(1), PatternField::TimeStamp(ts(1))), Assembly::Pending);
        assert!(matches!(
            asm.contribute(PulseId(1), PatternField::ActiveMask(9)),
            Assembly::Complete(_)
        ));
    }

    fn stamped(pulse: u64) -> PulseSnapshot {
        PulseSnapshot {
            time_stamp: ts(pulse as u32),
            ..PulseSnapshot::for_pulse(PulseId(pulse))
        }
    }

    #[test]
    fn complete_whole_snapshot() {
        let mut asm = PulseAssembler::resume_after(CompletionPolicy::TimeStamp, PulseId(41));
        assert_eq!(asm.complete(stamped(41)), Assembly::Stale);

        asm.contribute(PulseId(42), PatternField::InitMask(1));
        let snap = stamped(43);
        assert_eq!(asm.complete(snap), Assembly::Complete(snap));
        assert_eq!(asm.discarded(), 1);
        assert_eq!(asm.last_closed(), PulseId(43));
    }

    #[test]
    fn whole_snapshot_without_timestamp_is_refused() {
        let mut asm = PulseAssembler::default();
        asm.contribute(PulseId(49), PatternField::InitMask(1));

        let mut snap = PulseSnapshot::for_pulse(PulseId(50));
        snap.edef_active_mask = 0xF;
        assert_eq!(asm.complete(snap), Assembly::Incomplete);
        // Nothing moved: the in-progress pulse survives and 50 can still close.
        assert_eq!(asm.last_closed(), PulseId::INVALID);
        assert_eq!(asm.in_progress(), Some(PulseId(49)));
        assert_eq!(asm.discarded(), 0);
        assert!(matches!(asm.complete(stamped(50)), Assembly::Complete(_)));

        // A policy that does not need the timestamp accepts it.
        let mut masks_only = PulseAssembler::new(CompletionPolicy::Fields(FieldSet::ACTIVE_MASK));
        assert_eq!(masks_only.complete(snap), Assembly::Complete(snap));
    }
}
