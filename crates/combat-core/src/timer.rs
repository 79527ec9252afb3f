//! Deterministic one-shot timer scheduling on a combatant's timeline.
//!
//! Every delayed behavior of a combatant (cooldown readiness, stealth expiry,
//! crowd-control recovery, the dark-orb tick) is a [`TimerEvent`] queued in a
//! [`Scheduler`]. The scheduler never calls back into anything: the owner pops
//! due events and dispatches them itself, so a timer handler always runs with
//! full mutable access to the combatant.
//!
//! # Ordering
//!
//! Events fire in `(fire time, token)` order. Tokens are handed out in
//! increasing order, so two timers due at the same instant fire in the order
//! they were scheduled.
//!
//! # Cancellation
//!
//! [`Scheduler::cancel`] removes a token from the pending set; the heap entry
//! is discarded lazily when it reaches the front of the queue.
//!
//! # Example
//!
//! ```
//! use combat_core::timer::Scheduler;
//!
//! let mut timers: Scheduler<&str> = Scheduler::new();
//! let late = timers.schedule(2.0, "late");
//! timers.schedule(1.0, "early");
//! timers.cancel(late);
//!
//! assert_eq!(timers.pop_due(5.0).map(|(_, e)| e), Some("early"));
//! assert_eq!(timers.pop_due(5.0), None);
//! ```

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use serde::{Deserialize, Serialize};

use crate::cooldown::Ability;
use crate::entity::EntityId;

/// Handle to a scheduled timer, used to cancel it or to check that an expiring
/// event still belongs to the state that scheduled it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimerToken(u64);

impl TimerToken {
    /// Returns the raw sequence number.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Delayed events a combatant schedules on its own timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerEvent {
    /// An ability's cooldown ran out.
    CooldownReady(Ability),
    /// The stealth window closed.
    StealthExpired,
    /// Stun recovery.
    StunExpired,
    /// Shock recovery.
    ShockExpired,
    /// Small knockback recovery.
    KnockbackRecovered,
    /// Big knockback recovery.
    BigKnockbackRecovered,
    /// The guard stance hold elapsed.
    BlockHoldElapsed,
    /// One pulse of the dark-orb field.
    DarkOrbTick,
    /// A gravity projectile reached the end of its lifetime.
    GravityExpired(EntityId),
}

#[derive(Debug, Clone)]
struct Entry<E> {
    at: f64,
    token: TimerToken,
    event: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .total_cmp(&other.at)
            .then_with(|| self.token.cmp(&other.token))
    }
}

/// Priority queue of `(fire time, token, event)` with cancel-by-token.
#[derive(Debug, Clone)]
pub struct Scheduler<E> {
    now: f64,
    next_token: u64,
    queue: BinaryHeap<Reverse<Entry<E>>>,
    pending: HashSet<TimerToken>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> {
    /// Creates an empty scheduler at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: 0.0,
            next_token: 0,
            queue: BinaryHeap::new(),
            pending: HashSet::new(),
        }
    }

    /// Current time of this timeline, in seconds.
    #[must_use]
    pub const fn now(&self) -> f64 {
        self.now
    }

    /// Number of timers that are scheduled and not cancelled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if no timer is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Schedules `event` to fire `delay` seconds from now.
    ///
    /// Negative or NaN delays fire at the current time.
    pub fn schedule(&mut self, delay: f64, event: E) -> TimerToken {
        let delay = if delay > 0.0 { delay } else { 0.0 };
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.queue.push(Reverse(Entry {
            at: self.now + delay,
            token,
            event,
        }));
        self.pending.insert(token);
        token
    }

    /// Cancels a pending timer. Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        self.pending.remove(&token)
    }

    /// Returns `true` while the timer has neither fired nor been cancelled.
    #[must_use]
    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.pending.contains(&token)
    }

    /// Fire time of a pending timer.
    #[must_use]
    pub fn fire_time(&self, token: TimerToken) -> Option<f64> {
        if !self.is_pending(token) {
            return None;
        }
        self.queue
            .iter()
            .find(|Reverse(entry)| entry.token == token)
            .map(|Reverse(entry)| entry.at)
    }

    /// Pops the next event due at or before `until`, moving the clock to its
    /// fire time.
    ///
    /// Call this in a loop: handlers may schedule new events that also fall
    /// before `until`. Once it returns `None`, finish with
    /// [`set_now`](Self::set_now).
    pub fn pop_due(&mut self, until: f64) -> Option<(TimerToken, E)> {
        loop {
            let due = matches!(self.queue.peek(), Some(Reverse(entry)) if entry.at <= until);
            if !due {
                return None;
            }
            let Reverse(entry) = self.queue.pop()?;
            if self.pending.remove(&entry.token) {
                if entry.at > self.now {
                    self.now = entry.at;
                }
                return Some((entry.token, entry.event));
            }
        }
    }

    /// Moves the clock forward. The clock never runs backwards.
    pub fn set_now(&mut self, now: f64) {
        if now > self.now {
            self.now = now;
        }
    }
}
