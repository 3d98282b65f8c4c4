//! Timer priority queue
//!
//! Each timer class is one slot in the queue. The dispatch loop pops the
//! earliest slot, runs its action and re-arms it with a fresh countdown from
//! the slot's [`RearmPolicy`].

use rand::Rng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    RandomAuth,
    ExpirationSweep,
    RandomDisconnect,
    StatusReport,
}

impl TimerKind {
    pub fn name(self) -> &'static str {
        match self {
            TimerKind::RandomAuth => "random-auth",
            TimerKind::ExpirationSweep => "expiration-sweep",
            TimerKind::RandomDisconnect => "random-disconnect",
            TimerKind::StatusReport => "status-report",
        }
    }
}

/// How a slot picks its next countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RearmPolicy {
    Fixed(Duration),
    /// Fresh uniform draw from `[min, max]` every time
    Uniform { min: Duration, max: Duration },
}

impl RearmPolicy {
    /// Uniform between the bounds, or fixed when they coincide
    pub fn between(min: Duration, max: Duration) -> Self {
        if min >= max {
            RearmPolicy::Fixed(max)
        } else {
            RearmPolicy::Uniform { min, max }
        }
    }

    pub fn next_delay<R: Rng>(&self, rng: &mut R) -> Duration {
        match *self {
            RearmPolicy::Fixed(period) => period,
            RearmPolicy::Uniform { min, max } => {
                let millis = rng.gen_range(min.as_millis() as u64..=max.as_millis() as u64);
                Duration::from_millis(millis)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Timer {
    pub kind: TimerKind,
    pub policy: RearmPolicy,
    pub due: Instant,
    seq: u64,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap yields the earliest due time; equal due times
// fire in arming order.
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Timer>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, kind: TimerKind, policy: RearmPolicy, due: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Timer {
            kind,
            policy,
            due,
            seq,
        });
    }

    /// Earliest timer, removed from the queue
    pub fn pop(&mut self) -> Option<Timer> {
        self.heap.pop()
    }

    /// Put back a popped timer without changing its due time
    pub fn restore(&mut self, timer: Timer) {
        self.heap.push(timer);
    }

    /// Re-arm a fired timer relative to `now`
    pub fn rearm<R: Rng>(&mut self, timer: Timer, now: Instant, rng: &mut R) -> Instant {
        let due = now + timer.policy.next_delay(rng);
        self.arm(timer.kind, timer.policy, due);
        due
    }

    pub fn peek_due(&self) -> Option<Instant> {
        self.heap.peek().map(|t| t.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
