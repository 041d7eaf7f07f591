//! Event arrival FIFOs, one ring per event code.

use crate::cursor::{self, ClientCursor, Step};
use crate::error::TimingError;
use crate::record::EventRecord;
use crate::seq_ring::SeqRing;

/// Default number of arrivals retained per event code.
pub const MAX_TS_QUEUE: usize = 512;

/// Default size of the event-code table.
pub const DEFAULT_EVENT_CODES: usize = 256;

/// Table of per-event-code arrival rings.
pub struct EventFifo<const N: usize = MAX_TS_QUEUE> {
    rings: Box<[SeqRing<EventRecord, N>]>,
}

impl<const N: usize> EventFifo<N> {
    pub fn new(event_codes: usize) -> Self {
        Self {
            rings: (0..event_codes).map(|_| SeqRing::new()).collect(),
        }
    }

    #[inline]
    pub fn event_codes(&self) -> usize {
        self.rings.len()
    }

    /// Rings stay crate-private: their writer side belongs to the producer.
    #[inline]
    pub(crate) fn ring(&self, event_code: u32) -> Result<&SeqRing<EventRecord, N>, TimingError> {
        self.rings
            .get(event_code as usize)
            .ok_or(TimingError::UnknownEventCode(event_code))
    }

    /// Record an arrival in its event code's ring. Returns the logical index, or
    /// `None` when the code is outside the table.
    ///
    /// # Safety
    /// Must only be called from the single producer context.
    #[inline]
    pub(crate) unsafe fn push_unchecked(&self, record: EventRecord) -> Option<u64> {
        let ring = self.rings.get(record.event_code as usize)?;
        // SAFETY: forwarded from the caller's single-producer guarantee.
        Some(unsafe { ring.push_unchecked(record) })
    }

    /// Number of arrivals ever recorded for `event_code`.
    pub fn head(&self, event_code: u32) -> Result<u64, TimingError> {
        Ok(self.ring(event_code)?.head())
    }

    /// Resolve a client's cursor against one event code's ring.
    pub fn read(
        &self,
        event_code: u32,
        cursor: ClientCursor,
        step: Step,
    ) -> Result<(ClientCursor, EventRecord), TimingError> {
        cursor::resolve(self.ring(event_code)?, cursor, step)
    }

    /// Most recent arrival for `event_code`.
    pub fn latest(&self, event_code: u32) -> Result<EventRecord, TimingError> {
        self.ring(event_code)?
            .latest()
            .map(|(_, record)| record)
            .ok_or(TimingError::Invalid)
    }
}
