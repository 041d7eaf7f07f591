//! Timing event FIFO with per-client cursors and pulse-synchronized callbacks.
//!
//! # Highlights
//! - One lock-free overwrite ring per event code, written from the event path.
//! - Clients walk the rings with their own [`ClientCursor`] and get explicit
//!   overrun/underrun errors instead of silently wrong data.
//! - Pattern fields are assembled per pulse and published only when complete.
//! - BSA and timing event callbacks are dispatched synchronously, in registration order.
//! - The producer never blocks and never waits on a reader.
//!
//! # Quick start
//! ```
//! use std::sync::Arc;
//! use timing_fifo::{
//!     ClientCursor, EpicsTimeStamp, EventRecord, FnCallback, PatternField, PulseId,
//!     PulseSnapshot, Step, TimingConfig, TimingCore,
//! };
//!
//! let core = TimingCore::<512>::new(TimingConfig::default()).unwrap();
//! core.register_bsa_callback(Arc::new(FnCallback(|p: &PulseSnapshot| {
//!     assert_eq!(p.pulse_id, PulseId(1));
//! })))
//! .unwrap();
//!
//! let mut producer = core.producer().unwrap();
//! let ts = EpicsTimeStamp::new(1_000, 0);
//! producer.event(EventRecord::new(1, ts, PulseId(1), 0));
//! producer.contribute(PulseId(1), PatternField::ActiveMask(0b11));
//! producer.contribute(PulseId(1), PatternField::TimeStamp(ts));
//!
//! let (cursor, record) = core.fifo_read(1, ClientCursor::default(), Step::Newest).unwrap();
//! assert_eq!(cursor.index, 0);
//! assert_eq!(record.fiducial, PulseId(1));
//! assert_eq!(core.current_pattern().unwrap().edef_active_mask, 0b11);
//! ```
//!
//! # Safety and concurrency
//! Exactly one [`TimingProducer`] may be alive per core; `producer()` returns `None`
//! while one is held. Any number of threads may poll the core concurrently.
//! Callbacks run on the producer's thread and must be short and non-blocking.
//!
//! # Semantics
//! - Logical FIFO indices are unbounded `u64` values; index `i` is readable while
//!   it is one of the last `N` arrivals.
//! - `Overrun` means the requested index has not arrived yet; `Underrun` means it
//!   has already been overwritten. Re-sync with [`Step::Newest`] after either.
//! - Successive published pulses strictly increase in pulse id.
//! - [`PulseId::INVALID`] (all ones) marks "no pulse" everywhere.

pub mod assembler;
pub mod compat;
pub mod config;
pub mod cursor;
pub mod dispatch;
pub mod error;
pub mod fifo;
pub mod lookup;
pub mod record;
pub mod seq_ring;
pub mod timing;

pub use assembler::{Assembly, CompletionPolicy, FieldSet, PatternField, PulseAssembler};
pub use config::TimingConfig;
pub use cursor::{ClientCursor, Step, resolve};
pub use dispatch::{
    BsaCallback, CallbackKind, CallbackRegistry, Capacity, EventFilter, FnCallback,
    TimingEventCallback, WithContext,
};
pub use error::{ConfigError, TimingError};
pub use fifo::{EventFifo, MAX_TS_QUEUE};
pub use record::{
    BeamData, EDEF_MAX, EpicsTimeStamp, EventRecord, InvalidTimeSlot, PulseId, PulseSnapshot, TimeSlot,
};
pub use seq_ring::{RingWriter, SeqRing};
pub use timing::{TimingCore, TimingProducer};

mod atomic {
    #[cfg(feature = "portable-atomic")]
    pub(crate) use portable_atomic::{AtomicBool, AtomicU64};

    #[cfg(not(feature = "portable-atomic"))]
    pub(crate) use core::sync::atomic::{AtomicBool, AtomicU64};
}
