//! Reference clock abstraction.
//! The clock (an external run timer) is the authority the playback stream is
//! kept aligned to. This crate only reads its time and phase and subscribes
//! to its lifecycle events; it never mutates the clock.

use crossbeam::channel::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, Weak};

use crate::core::lock;
use crate::core::time::Time;

/// Phase of the reference clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    /// No run in progress
    NotRunning,
    /// Timer advancing
    Running,
    /// Timer halted mid-run
    Paused,
}

/// Lifecycle event emitted by the reference clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// NotRunning -> Running, fresh run
    Start,
    /// Running -> Paused
    Pause,
    /// Paused -> Running
    Resume,
    /// Any phase -> NotRunning
    Reset,
}

/// The external timing authority.
///
/// Implementations adapt whatever timer drives the session (an event timer,
/// a test clock). `current_time` and `phase` must be cheap and callable from
/// any thread.
pub trait ReferenceClock: Send + Sync {
    /// Current reference time
    fn current_time(&self) -> Time;

    /// Current phase
    fn phase(&self) -> TimerPhase;

    /// Register for lifecycle events. The subscription must be explicitly
    /// released (or dropped) on teardown or the clock retains the sender.
    fn subscribe(&self) -> ClockSubscription;
}

type Subscribers = Mutex<Vec<(u64, Sender<ClockEvent>)>>;

struct HubInner {
    subscribers: Subscribers,
    next_id: Mutex<u64>,
}

/// Publisher side of the clock event contract.
///
/// Clock implementations embed one of these and call [`EventHub::broadcast`]
/// on every phase transition. Subscribers that have gone away are pruned on
/// the next broadcast.
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: Mutex::new(0),
            }),
        }
    }

    /// Register a new subscriber and hand back its receiving end together
    /// with the deregistration guard.
    pub fn subscribe(&self) -> ClockSubscription {
        let (tx, rx) = channel::unbounded();
        let id = {
            let mut next = lock(&self.inner.next_id);
            *next += 1;
            *next
        };
        lock(&self.inner.subscribers).push((id, tx));
        ClockSubscription {
            events: rx,
            guard: SubscriptionGuard {
                hub: Arc::downgrade(&self.inner),
                id,
            },
        }
    }

    /// Deliver an event to every live subscriber.
    pub fn broadcast(&self, event: ClockEvent) {
        let mut subs = lock(&self.inner.subscribers);
        subs.retain(|(_, tx)| tx.send(event).is_ok());
    }

    /// Number of registered subscribers (diagnostics and tests).
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A live registration with a clock's [`EventHub`].
pub struct ClockSubscription {
    events: Receiver<ClockEvent>,
    guard: SubscriptionGuard,
}

impl ClockSubscription {
    /// Split into the event receiver (moved into whatever thread consumes
    /// events) and the guard (kept wherever teardown happens).
    pub fn split(self) -> (Receiver<ClockEvent>, SubscriptionGuard) {
        (self.events, self.guard)
    }

    /// Receiver without splitting, for callers that poll in place.
    pub fn events(&self) -> &Receiver<ClockEvent> {
        &self.events
    }
}

/// Deregistration handle. Removing the registration drops the hub's sender,
/// which disconnects the receiver and lets the consuming loop exit.
pub struct SubscriptionGuard {
    hub: Weak<HubInner>,
    id: u64,
}

impl SubscriptionGuard {
    /// Explicitly deregister. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}

    fn remove(&self) {
        if let Some(hub) = self.hub.upgrade() {
            lock(&hub.subscribers).retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.remove();
    }
}
