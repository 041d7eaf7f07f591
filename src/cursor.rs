//! Per-client FIFO cursors.
//!
//! A cursor is a plain value owned by the client. Resolution is a pure function of
//! the ring state, the cursor and the requested step, so any number of clients can
//! walk the same ring at independent rates without coordinating.

use crate::error::TimingError;
use crate::seq_ring::SeqRing;

/// Logical position of the record a client last read.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientCursor {
    pub index: u64,
}

impl ClientCursor {
    pub const fn at(index: u64) -> Self {
        Self { index }
    }

    /// Resolve `step` against `ring` and move this cursor only on success.
    pub fn advance<T: Copy, const N: usize>(
        &mut self,
        ring: &SeqRing<T, N>,
        step: Step,
    ) -> Result<T, TimingError> {
        let (next, value) = resolve(ring, *self, step)?;
        *self = next;
        Ok(value)
    }
}

/// Requested cursor movement.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Jump to the most recent arrival.
    Newest,
    /// Move relative to the current position; `By(1)` is the steady-state read.
    By(i64),
}

impl Step {
    /// Decode a raw increment where `depth` is the "sync to newest" sentinel.
    #[inline]
    pub fn from_raw(incr: i32, depth: usize) -> Self {
        if i64::from(incr) == depth as i64 {
            Step::Newest
        } else {
            Step::By(i64::from(incr))
        }
    }
}

/// Resolve `step` from `cursor` into a new cursor and the record it points at.
///
/// `cursor` is taken by value and never modified; on error the caller still holds
/// its previous position and may retry or re-sync with [`Step::Newest`].
pub fn resolve<T: Copy, const N: usize>(
    ring: &SeqRing<T, N>,
    cursor: ClientCursor,
    step: Step,
) -> Result<(ClientCursor, T), TimingError> {
    match step {
        Step::Newest => match ring.latest() {
            Some((index, value)) => Ok((ClientCursor::at(index), value)),
            None => Err(TimingError::Overrun { index: 0, head: 0 }),
        },
        Step::By(incr) => {
            let index = cursor
                .index
                .checked_add_signed(incr)
                .ok_or(TimingError::InvalidIndex {
                    index: cursor.index,
                    incr,
                })?;
            let value = ring.read(index)?;
            Ok((ClientCursor::at(index), value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filled<const N: usize>(writes: u64) -> SeqRing<u64, N> {
        let ring = SeqRing::<u64, N>::new();
        {
            let writer = ring.writer().unwrap();
            for i in 0..writes {
                writer.push(i);
            }
        }
        ring
    }

    #[test]
    fn depth_four_scenario() {
        let ring = filled::<4>(6);

        let err = resolve(&ring, ClientCursor::at(0), Step::By(1)).unwrap_err();
        assert_eq!(err, TimingError::Underrun { index: 1, head: 6 });

        let (cursor, value) = resolve(&ring, ClientCursor::at(0), Step::Newest).unwrap();
        assert_eq!(cursor.index, 5);
        assert_eq!(value, 5);
    }

    #[test]
    fn newest_on_empty_ring_fails() {
        let ring = SeqRing::<u64, 4>::new();
        assert!(matches!(
            resolve(&ring, ClientCursor::default(), Step::Newest),
            Err(TimingError::Overrun { .. })
        ));
    }

    #[test]
    fn reading_past_head_is_overrun_and_cursor_kept() {
        let ring = filled::<8>(3);
        let mut cursor = ClientCursor::at(2);
        let err = cursor.advance(&ring, Step::By(1)).unwrap_err();
        assert_eq!(err, TimingError::Overrun { index: 3, head: 3 });
        assert_eq!(cursor.index, 2);
    }

    #[test]
    fn walking_backwards() {
        let ring = filled::<8>(5);
        let mut cursor = ClientCursor::default();
        assert_eq!(cursor.advance(&ring, Step::Newest), Ok(4));
        assert_eq!(cursor.advance(&ring, Step::By(-1)), Ok(3));
        assert_eq!(cursor.advance(&ring, Step::By(-3)), Ok(0));
        assert_eq!(
            cursor.advance(&ring, Step::By(-1)),
            Err(TimingError::InvalidIndex { index: 0, incr: -1 })
        );
        assert_eq!(cursor.index, 0);
    }

    #[test]
    fn raw_increment_sentinel() {
        assert_eq!(Step::from_raw(512, 512), Step::Newest);
        assert_eq!(Step::from_raw(1, 512), Step::By(1));
        assert_eq!(Step::from_raw(-1, 512), Step::By(-1));
        assert_eq!(Step::from_raw(4, 4), Step::Newest);
    }

    proptest! {
        #[test]
        fn steady_state_never_loses_sync(warmup in 1u64..40, steps in 1usize..200) {
            let ring = SeqRing::<u64, 8>::new();
            let writer = ring.writer().unwrap();
            for i in 0..warmup {
                writer.push(i);
            }
            let mut cursor = ClientCursor::default();
            prop_assert_eq!(cursor.advance(&ring, Step::Newest), Ok(warmup - 1));
            for n in 0..steps as u64 {
                writer.push(warmup + n);
                prop_assert_eq!(cursor.advance(&ring, Step::By(1)), Ok(warmup + n));
            }
        }

        #[test]
        fn newest_matches_last_write(writes in 1u64..100) {
            let ring = filled::<16>(writes);
            let (cursor, value) = resolve(&ring, ClientCursor::default(), Step::Newest).unwrap();
            prop_assert_eq!(cursor.index, ring.head() - 1);
            prop_assert_eq!(value, writes - 1);
        }
    }
}
