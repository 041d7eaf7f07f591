//! Integer-status API with optional out-parameters.
//!
//! These wrappers mirror the shape of the timing API used by existing device
//! support: results come back through out-parameters, the return value is a
//! status code, and the FIFO index is an in-out `u64` that is left untouched
//! on failure. A missing out-parameter yields [`STATUS_NULL_ARGUMENT`].

use std::sync::Arc;

use crate::cursor::{ClientCursor, Step};
use crate::dispatch::{BsaCallback, EventFilter, TimingEventCallback};
use crate::error::TimingError;
use crate::record::{BeamData, EpicsTimeStamp, PulseId, PulseSnapshot};
use crate::timing::TimingCore;

pub const STATUS_OK: i32 = 0;
pub const STATUS_NULL_ARGUMENT: i32 = TimingError::NullArgument.status();
pub const STATUS_INVALID_INDEX: i32 = TimingError::InvalidIndex { index: 0, incr: 0 }.status();
pub const STATUS_OVERRUN: i32 = TimingError::Overrun { index: 0, head: 0 }.status();
pub const STATUS_UNDERRUN: i32 = TimingError::Underrun { index: 0, head: 0 }.status();
pub const STATUS_REFUSED: i32 = TimingError::Refused {
    kind: crate::dispatch::CallbackKind::BsaPattern,
}
.status();
pub const STATUS_INVALID: i32 = TimingError::Invalid.status();
pub const STATUS_UNKNOWN_EVENT_CODE: i32 = TimingError::UnknownEventCode(0).status();

/// One FIFO entry as returned by [`timing_fifo_read`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FifoInfo {
    pub fifo_time: EpicsTimeStamp,
    pub fifo_fid: u64,
    pub fifo_tsc: i64,
    pub fifo_status: i32,
}

#[inline]
fn status_of<T>(result: Result<T, TimingError>, out: &mut T) -> i32 {
    match result {
        Ok(v) => {
            *out = v;
            STATUS_OK
        }
        Err(e) => e.status(),
    }
}

/// Read `event_code`'s FIFO relative to `*index`.
///
/// `incr == N` (the ring depth) syncs to the newest arrival; any other value
/// moves the index by `incr`. `*index` and `*out` are updated only on success;
/// on failure `out.fifo_status` carries the status as well.
pub fn timing_fifo_read<const N: usize>(
    core: &TimingCore<N>,
    event_code: u32,
    incr: i32,
    index: Option<&mut u64>,
    out: Option<&mut FifoInfo>,
) -> i32 {
    let (Some(index), Some(out)) = (index, out) else {
        return STATUS_NULL_ARGUMENT;
    };
    let step = Step::from_raw(incr, N);
    match core.fifo_read(event_code, ClientCursor::at(*index), step) {
        Ok((cursor, record)) => {
            *index = cursor.index;
            *out = FifoInfo {
                fifo_time: record.timestamp,
                fifo_fid: record.fiducial.get(),
                fifo_tsc: record.cpu_cycles,
                fifo_status: STATUS_OK,
            };
            STATUS_OK
        }
        Err(e) => {
            out.fifo_status = e.status();
            e.status()
        }
    }
}

pub fn timing_get_cur_bsa_pattern<const N: usize>(
    core: &TimingCore<N>,
    out: Option<&mut PulseSnapshot>,
) -> i32 {
    match out {
        Some(out) => status_of(core.current_pattern(), out),
        None => STATUS_NULL_ARGUMENT,
    }
}

pub fn timing_get_cur_time_stamp<const N: usize>(
    core: &TimingCore<N>,
    out: Option<&mut EpicsTimeStamp>,
) -> i32 {
    match out {
        Some(out) => status_of(core.current_timestamp(), out),
        None => STATUS_NULL_ARGUMENT,
    }
}

pub fn timing_get_event_time_stamp<const N: usize>(
    core: &TimingCore<N>,
    out: Option<&mut EpicsTimeStamp>,
    event_code: u32,
) -> i32 {
    match out {
        Some(out) => status_of(core.event_timestamp(event_code), out),
        None => STATUS_NULL_ARGUMENT,
    }
}

pub fn timing_get_beam_data<const N: usize>(
    core: &TimingCore<N>,
    out: Option<&mut BeamData>,
) -> i32 {
    match out {
        Some(out) => status_of(core.beam_data(), out),
        None => STATUS_NULL_ARGUMENT,
    }
}

/// Last fiducial, with all-ones meaning none yet.
pub fn timing_get_last_fiducial<const N: usize>(core: &TimingCore<N>) -> u64 {
    core.last_fiducial().get()
}

/// Fiducial for `ts`, with all-ones meaning no match in the retained window.
pub fn timing_get_fiducial_for_time_stamp<const N: usize>(
    core: &TimingCore<N>,
    ts: EpicsTimeStamp,
) -> u64 {
    core.fiducial_for_timestamp(ts).get()
}

pub fn register_bsa_timing_callback<const N: usize>(
    core: &TimingCore<N>,
    callback: Arc<dyn BsaCallback>,
) -> i32 {
    match core.register_bsa_callback(callback) {
        Ok(_) => STATUS_OK,
        Err(e) => e.status(),
    }
}

/// Register for every event code.
pub fn register_timing_event_callback<const N: usize>(
    core: &TimingCore<N>,
    callback: Arc<dyn TimingEventCallback>,
) -> i32 {
    match core.register_timing_event_callback(EventFilter::All, callback) {
        Ok(_) => STATUS_OK,
        Err(e) => e.status(),
    }
}

/// `true` when `fid` is a usable pulse id.
#[inline]
pub fn is_valid_fiducial(fid: u64) -> bool {
    PulseId(fid).is_valid()
}
