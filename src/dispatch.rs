//! Callback registry and synchronous dispatch.
//!
//! Two callback kinds exist: BSA pattern callbacks, fed one [`PulseSnapshot`] per
//! published pulse, and timing event callbacks, fed one [`EventRecord`] per arrival
//! on the event codes they subscribe to. Both live in the same [`CallbackSlot`]
//! type; the only difference between them is the slot's [`Capacity`].
//!
//! # Concurrency
//! Registration publishes a new list through `ArcSwap` with a compare-and-swap
//! retry loop. Dispatch loads the current list without locking or allocating and
//! invokes every entry in registration order, one pass per publish.
//!
//! # Client obligations
//! Callbacks run on the producer path. They must be short and must not block;
//! a slow callback delays every callback after it and the producer itself. The
//! reference passed in is only valid for the duration of the call; copy the data
//! to keep it.

use core::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::TimingError;
use crate::record::{EventRecord, PulseSnapshot};

/// Registration kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    BsaPattern,
    TimingEvent,
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackKind::BsaPattern => f.write_str("bsa pattern"),
            CallbackKind::TimingEvent => f.write_str("timing event"),
        }
    }
}

/// Receives one assembled pulse at a time.
pub trait BsaCallback: Send + Sync {
    fn on_pattern(&self, pattern: &PulseSnapshot);
}

/// Receives event arrivals.
pub trait TimingEventCallback: Send + Sync {
    fn on_event(&self, event: &EventRecord);
}

/// Closure-based callback.
pub struct FnCallback<F>(pub F);

impl<F: Fn(&PulseSnapshot) + Send + Sync> BsaCallback for FnCallback<F> {
    fn on_pattern(&self, pattern: &PulseSnapshot) {
        (self.0)(pattern);
    }
}

impl<F: Fn(&EventRecord) + Send + Sync> TimingEventCallback for FnCallback<F> {
    fn on_event(&self, event: &EventRecord) {
        (self.0)(event);
    }
}

/// Callback that is handed a user context alongside each delivery.
pub struct WithContext<C, F> {
    context: C,
    f: F,
}

impl<C, F> WithContext<C, F> {
    pub fn new(context: C, f: F) -> Self {
        Self { context, f }
    }

    pub fn context(&self) -> &C {
        &self.context
    }
}

impl<C: Send + Sync, F: Fn(&C, &PulseSnapshot) + Send + Sync> BsaCallback for WithContext<C, F> {
    fn on_pattern(&self, pattern: &PulseSnapshot) {
        (self.f)(&self.context, pattern);
    }
}

impl<C: Send + Sync, F: Fn(&C, &EventRecord) + Send + Sync> TimingEventCallback
    for WithContext<C, F>
{
    fn on_event(&self, event: &EventRecord) {
        (self.f)(&self.context, event);
    }
}

/// Which event codes a timing event callback receives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Code(u32),
}

impl EventFilter {
    #[inline]
    pub fn matches(&self, event_code: u32) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Code(code) => *code == event_code,
        }
    }
}

#[derive(Clone)]
pub(crate) struct EventSubscription {
    filter: EventFilter,
    callback: Arc<dyn TimingEventCallback>,
}

/// Maximum number of registrations a slot admits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Capacity {
    Bounded(usize),
    Unbounded,
}

impl Capacity {
    #[inline]
    fn admits(&self, registered: usize) -> bool {
        match self {
            Capacity::Bounded(max) => registered < *max,
            Capacity::Unbounded => true,
        }
    }
}

/// Ordered, append-only list of registrations of one kind.
pub struct CallbackSlot<E> {
    kind: CallbackKind,
    capacity: Capacity,
    entries: ArcSwap<Vec<E>>,
}

impl<E: Clone> CallbackSlot<E> {
    pub fn new(kind: CallbackKind, capacity: Capacity) -> Self {
        Self {
            kind,
            capacity,
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Append `entry`, returning its registration position.
    pub fn register(&self, entry: E) -> Result<usize, TimingError> {
        loop {
            let current = self.entries.load_full();
            if !self.capacity.admits(current.len()) {
                tracing::warn!(kind = %self.kind, registered = current.len(), "callback registration refused");
                return Err(TimingError::Refused { kind: self.kind });
            }
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(entry.clone());
            let position = current.len();

            let prev = self.entries.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*prev, &current) {
                tracing::info!(kind = %self.kind, position, "callback registered");
                return Ok(position);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn for_each(&self, mut f: impl FnMut(&E)) {
        let entries = self.entries.load();
        for entry in entries.iter() {
            f(entry);
        }
    }
}

/// Registry holding both callback kinds.
pub struct CallbackRegistry {
    bsa: CallbackSlot<Arc<dyn BsaCallback>>,
    events: CallbackSlot<EventSubscription>,
}

impl CallbackRegistry {
    pub fn new(bsa_capacity: Capacity) -> Self {
        Self {
            bsa: CallbackSlot::new(CallbackKind::BsaPattern, bsa_capacity),
            events: CallbackSlot::new(CallbackKind::TimingEvent, Capacity::Unbounded),
        }
    }

    pub fn register_bsa(&self, callback: Arc<dyn BsaCallback>) -> Result<usize, TimingError> {
        self.bsa.register(callback)
    }

    pub fn register_event(
        &self,
        filter: EventFilter,
        callback: Arc<dyn TimingEventCallback>,
    ) -> Result<usize, TimingError> {
        self.events.register(EventSubscription { filter, callback })
    }

    pub fn registered(&self, kind: CallbackKind) -> usize {
        match kind {
            CallbackKind::BsaPattern => self.bsa.len(),
            CallbackKind::TimingEvent => self.events.len(),
        }
    }

    /// Deliver a freshly published pulse to every BSA callback.
    pub fn dispatch_pattern(&self, pattern: &PulseSnapshot) {
        self.bsa.for_each(|cb| cb.on_pattern(pattern));
    }

    /// Deliver an arrival to every timing event callback subscribed to its code.
    pub fn dispatch_event(&self, event: &EventRecord) {
        self.events.for_each(|sub| {
            if sub.filter.matches(event.event_code) {
                sub.callback.on_event(event);
            }
        });
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new(Capacity::Bounded(1))
    }
}
