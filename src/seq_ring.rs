//! Lock-free single-writer overwrite ring addressed by unbounded logical indices.
//!
//! # Overview
//! - One writer, any number of readers. Readers never hold state inside the ring.
//! - The writer never blocks or allocates; new writes overwrite the oldest slots when the ring wraps.
//! - `head` counts every write ever made. Logical index `i` lives in slot `i % N` and is readable
//!   while `i` is in `[head - N, head)`.
//! - `read` reports `Overrun` for indices not yet written and `Underrun` for indices already
//!   overwritten. `latest` samples the newest value.
//!
//! # Memory ordering
//! Each slot carries a sequence word holding `index + 1` (`0` = empty or being rewritten). The writer
//! clears the word, writes the value, publishes the word, then publishes `head`. A reader loads
//! `head` once, validates the slot word before and after copying the value, and treats any change
//! as an overwrite. A reader therefore never returns a torn value; at worst it reports `Underrun`
//! for a slot the writer reclaimed mid-read.
//!
//! # Notes
//! - `T` is `Copy` so values are returned by copy without allocation.
//! - The `head` a reader acts on may already be stale when the call returns. Results are "this
//!   index, or an error", never a silently different index.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{Ordering, fence};

use crossbeam_utils::CachePadded;

use crate::atomic::{AtomicBool, AtomicU64};
use crate::error::TimingError;

const EMPTY: u64 = 0;

fn atomic_u64_array<const N: usize>(init: u64) -> [AtomicU64; N] {
    core::array::from_fn(|_| AtomicU64::new(init))
}

fn unsafe_cell_array<T, const N: usize>() -> [UnsafeCell<MaybeUninit<T>>; N] {
    core::array::from_fn(|_| UnsafeCell::new(MaybeUninit::uninit()))
}

/// Overwrite ring with one writer and lock-free readers.
pub struct SeqRing<T: Copy, const N: usize> {
    head: CachePadded<AtomicU64>,
    writer_claimed: AtomicBool,
    slot_seq: [AtomicU64; N],
    slots: [UnsafeCell<MaybeUninit<T>>; N],
}

unsafe impl<T: Copy + Send, const N: usize> Sync for SeqRing<T, N> {}

impl<T: Copy, const N: usize> Default for SeqRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, const N: usize> SeqRing<T, N> {
    pub fn new() -> Self {
        assert!(N > 0);
        Self {
            head: CachePadded::new(AtomicU64::new(0)),
            writer_claimed: AtomicBool::new(false),
            slot_seq: atomic_u64_array::<N>(EMPTY),
            slots: unsafe_cell_array::<T, N>(),
        }
    }

    #[inline(always)]
    const fn idx_for(index: u64) -> usize {
        (index % N as u64) as usize
    }

    /// Number of slots.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Total number of writes so far; the next write lands at this logical index.
    #[inline]
    pub fn head(&self) -> u64 {
        self.head.load(Ordering::Acquire)
    }

    /// Oldest logical index still retained for the given `head`.
    #[inline]
    pub const fn oldest_for(head: u64) -> u64 {
        head.saturating_sub(N as u64)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head() == 0
    }

    /// Claim the writer handle. Returns `None` while another writer is alive.
    pub fn writer(&self) -> Option<RingWriter<'_, T, N>> {
        self.writer_claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| RingWriter { ring: self })
    }

    /// Append `value` at logical index `head` and return that index.
    ///
    /// # Safety
    /// The caller must guarantee that no other call to `push_unchecked` (or a live
    /// [`RingWriter`]) runs concurrently on this ring.
    #[inline]
    pub unsafe fn push_unchecked(&self, value: T) -> u64 {
        let index = self.head.load(Ordering::Relaxed);
        let idx = Self::idx_for(index);

        self.slot_seq[idx].swap(EMPTY, Ordering::Acquire);
        fence(Ordering::Release);

        unsafe { (*self.slots[idx].get()).as_mut_ptr().write(value) };

        self.slot_seq[idx].store(index + 1, Ordering::Release);
        self.head.store(index + 1, Ordering::Release);
        index
    }

    /// Copy out the value at logical `index`.
    pub fn read(&self, index: u64) -> Result<T, TimingError> {
        let head = self.head();
        if index >= head {
            return Err(TimingError::Overrun { index, head });
        }
        if index < Self::oldest_for(head) {
            return Err(TimingError::Underrun { index, head });
        }
        self.read_slot(index)
            .ok_or(TimingError::Underrun { index, head })
    }

    /// Newest value and its logical index, or `None` before the first write.
    pub fn latest(&self) -> Option<(u64, T)> {
        loop {
            let head = self.head();
            if head == 0 {
                return None;
            }
            // Only fails if the writer lapped the whole ring during the copy.
            if let Some(v) = self.read_slot(head - 1) {
                return Some((head - 1, v));
            }
            core::hint::spin_loop();
        }
    }

    #[inline]
    fn read_slot(&self, index: u64) -> Option<T> {
        let idx = Self::idx_for(index);

        let s1 = self.slot_seq[idx].load(Ordering::Acquire);
        if s1 != index + 1 {
            return None;
        }

        let v = unsafe { core::ptr::read_volatile((*self.slots[idx].get()).as_ptr()) };

        fence(Ordering::Acquire);
        let s2 = self.slot_seq[idx].load(Ordering::Relaxed);
        if s2 != s1 {
            return None;
        }

        Some(v)
    }
}

/// Exclusive writer handle; dropping it releases the claim.
pub struct RingWriter<'a, T: Copy, const N: usize> {
    ring: &'a SeqRing<T, N>,
}

impl<'a, T: Copy, const N: usize> RingWriter<'a, T, N> {
    #[inline]
    pub fn push(&self, value: T) -> u64 {
        // SAFETY: the claim flag guarantees this is the only writer.
        unsafe { self.ring.push_unchecked(value) }
    }
}

impl<'a, T: Copy, const N: usize> Drop for RingWriter<'a, T, N> {
    fn drop(&mut self) {
        self.ring.writer_claimed.store(false, Ordering::Release);
    }
}
