//! The timing core: event FIFOs, published pulse state and callbacks behind one handle.
//!
//! [`TimingCore`] is shared by reference with every consumer. Exactly one
//! [`TimingProducer`] may exist at a time; it is the only writer of the FIFOs and
//! of the published pattern and beam cells, and it drives callback dispatch.
//!
//! Published state lives in small [`SeqRing`]s read through `latest()`: a publish
//! is one slot write plus one counter store, and readers always receive a complete
//! copy of one record.

use core::sync::atomic::Ordering;
use std::sync::Arc;

use crate::assembler::{Assembly, PatternField, PulseAssembler};
use crate::atomic::{AtomicBool, AtomicU64};
use crate::config::TimingConfig;
use crate::cursor::{ClientCursor, Step};
use crate::dispatch::{BsaCallback, Capacity, CallbackRegistry, EventFilter, TimingEventCallback};
use crate::error::{ConfigError, TimingError};
use crate::fifo::{EventFifo, MAX_TS_QUEUE};
use crate::lookup;
use crate::record::{BeamData, EpicsTimeStamp, EventRecord, PulseId, PulseSnapshot};
use crate::seq_ring::SeqRing;

/// Slots behind each published cell. Readers only ever look at the newest one.
const PUBLISH_DEPTH: usize = 4;

/// Shared timing state for one receiver.
pub struct TimingCore<const N: usize = MAX_TS_QUEUE> {
    config: TimingConfig,
    fifo: EventFifo<N>,
    pattern: SeqRing<PulseSnapshot, PUBLISH_DEPTH>,
    beam: SeqRing<BeamData, PUBLISH_DEPTH>,
    last_fiducial: AtomicU64,
    registry: CallbackRegistry,
    producer_claimed: AtomicBool,
}

impl<const N: usize> TimingCore<N> {
    pub fn new(config: TimingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        tracing::info!(
            depth = N,
            event_codes = config.event_codes,
            fiducial_event_code = config.fiducial_event_code,
            completion = ?config.completion,
            "timing core created"
        );
        Ok(Self::build(config))
    }

    fn build(config: TimingConfig) -> Self {
        Self {
            fifo: EventFifo::new(config.event_codes),
            pattern: SeqRing::new(),
            beam: SeqRing::new(),
            last_fiducial: AtomicU64::new(PulseId::INVALID.get()),
            registry: CallbackRegistry::new(Capacity::Bounded(config.bsa_callback_capacity)),
            producer_claimed: AtomicBool::new(false),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    #[inline]
    pub fn fifo(&self) -> &EventFifo<N> {
        &self.fifo
    }

    #[inline]
    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    /// Claim the producer handle. Returns `None` while another producer is alive.
    pub fn producer(&self) -> Option<TimingProducer<'_, N>> {
        self.producer_claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        let last = self
            .pattern
            .latest()
            .map_or(PulseId::INVALID, |(_, p)| p.pulse_id);
        Some(TimingProducer {
            core: self,
            assembler: PulseAssembler::resume_after(self.config.completion, last),
        })
    }

    // Registration

    pub fn register_bsa_callback(
        &self,
        callback: Arc<dyn BsaCallback>,
    ) -> Result<usize, TimingError> {
        self.registry.register_bsa(callback)
    }

    pub fn register_timing_event_callback(
        &self,
        filter: EventFilter,
        callback: Arc<dyn TimingEventCallback>,
    ) -> Result<usize, TimingError> {
        if let EventFilter::Code(code) = filter {
            self.fifo.ring(code)?;
        }
        self.registry.register_event(filter, callback)
    }

    // Polling. Nothing here blocks; every call returns the state available right now.

    /// The most recently published pulse.
    pub fn current_pattern(&self) -> Result<PulseSnapshot, TimingError> {
        self.pattern
            .latest()
            .map(|(_, p)| p)
            .ok_or(TimingError::Invalid)
    }

    /// Timestamp of the most recently published pulse.
    pub fn current_timestamp(&self) -> Result<EpicsTimeStamp, TimingError> {
        let ts = self.current_pattern()?.time_stamp;
        if ts.is_set() {
            Ok(ts)
        } else {
            Err(TimingError::Invalid)
        }
    }

    /// Timestamp of the latest arrival of `event_code`.
    pub fn event_timestamp(&self, event_code: u32) -> Result<EpicsTimeStamp, TimingError> {
        self.fifo.latest(event_code).map(|r| r.timestamp)
    }

    pub fn beam_data(&self) -> Result<BeamData, TimingError> {
        self.beam
            .latest()
            .map(|(_, b)| b)
            .ok_or(TimingError::Invalid)
    }

    /// Last fiducial seen on the fiducial event code, or `INVALID` before the first.
    pub fn last_fiducial(&self) -> PulseId {
        PulseId(self.last_fiducial.load(Ordering::Acquire))
    }

    /// Fiducial of the fiducial-code arrival stamped exactly `ts`, or `INVALID`.
    pub fn fiducial_for_timestamp(&self, ts: EpicsTimeStamp) -> PulseId {
        match self.fifo.ring(self.config.fiducial_event_code) {
            Ok(ring) => lookup::fiducial_for_timestamp(ring, ts),
            Err(_) => PulseId::INVALID,
        }
    }

    /// Move `cursor` through `event_code`'s FIFO. See [`crate::cursor::resolve`].
    pub fn fifo_read(
        &self,
        event_code: u32,
        cursor: ClientCursor,
        step: Step,
    ) -> Result<(ClientCursor, EventRecord), TimingError> {
        self.fifo.read(event_code, cursor, step)
    }
}

impl<const N: usize> Default for TimingCore<N> {
    fn default() -> Self {
        Self::build(TimingConfig::default())
    }
}

/// The single producer. Every method is non-blocking and allocation free, apart
/// from whatever registered callbacks do.
pub struct TimingProducer<'a, const N: usize = MAX_TS_QUEUE> {
    core: &'a TimingCore<N>,
    assembler: PulseAssembler,
}

impl<'a, const N: usize> TimingProducer<'a, N> {
    /// Record one hardware arrival and notify timing event callbacks.
    ///
    /// Returns the arrival's logical FIFO index, or `None` if its event code is
    /// outside the configured table (the arrival is dropped).
    pub fn event(&mut self, record: EventRecord) -> Option<u64> {
        // SAFETY: `self` is the only producer for this core.
        let Some(index) = (unsafe { self.core.fifo.push_unchecked(record) }) else {
            tracing::warn!(event_code = record.event_code, "arrival for unknown event code dropped");
            return None;
        };
        if record.event_code == self.core.config.fiducial_event_code {
            self.core
                .last_fiducial
                .store(record.fiducial.get(), Ordering::Release);
        }
        self.core.registry.dispatch_event(&record);
        Some(index)
    }

    /// Fold one pattern field into its pulse; publishes and dispatches on completion.
    pub fn contribute(&mut self, pulse_id: PulseId, field: PatternField) -> Assembly {
        let assembly = self.assembler.contribute(pulse_id, field);
        if let Assembly::Complete(snapshot) = &assembly {
            self.publish(snapshot);
        }
        assembly
    }

    /// Publish a pulse whose fields are all known at once.
    pub fn publish_pattern(&mut self, snapshot: PulseSnapshot) -> Assembly {
        let assembly = self.assembler.complete(snapshot);
        if let Assembly::Complete(snapshot) = &assembly {
            self.publish(snapshot);
        }
        assembly
    }

    /// Replace the current beam data.
    pub fn publish_beam(&mut self, beam: BeamData) {
        // SAFETY: `self` is the only producer for this core.
        unsafe { self.core.beam.push_unchecked(beam) };
    }

    /// Incomplete pulses discarded since this producer was claimed.
    pub fn discarded_pulses(&self) -> u64 {
        self.assembler.discarded()
    }

    fn publish(&self, snapshot: &PulseSnapshot) {
        // SAFETY: `self` is the only producer for this core.
        unsafe { self.core.pattern.push_unchecked(*snapshot) };
        self.core.registry.dispatch_pattern(snapshot);
    }
}

impl<'a, const N: usize> Drop for TimingProducer<'a, N> {
    fn drop(&mut self) {
        self.core.producer_claimed.store(false, Ordering::Release);
    }
}
