// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{self, AtomicU64};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::Clock;

/// Identity of one timer user. Cancellation is keyed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

impl TimerToken {
    /// Allocate a process-unique token.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, atomic::Ordering::Relaxed))
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// "Deliver this token after `delay`" / "cancel everything for this token".
pub trait Scheduler: Send + Sync {
    fn schedule(&self, token: TimerToken, delay: Duration);
    fn cancel(&self, token: TimerToken);
}

#[derive(Debug)]
struct Entry {
    deadline: i64,
    /// Insertion order, breaks deadline ties FIFO.
    seq: u64,
    token: TimerToken,
}

impl Eq for Entry {}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap (earliest deadline = highest priority)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct Inner {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

/// Min-heap of token deadlines measured on a [`Clock`].
///
/// The queue never fires anything by itself: the owner (normally a
/// [`SessionWorker`](crate::session::SessionWorker)) sleeps until
/// [`time_until_next`](Self::time_until_next) and then drains
/// [`pop_expired`](Self::pop_expired).
pub struct TimerQueue {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl TimerQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Earliest pending deadline, in clock milliseconds.
    pub fn next_deadline(&self) -> Option<i64> {
        self.inner.lock().heap.peek().map(|e| e.deadline)
    }

    /// Time left until the earliest deadline (zero if already due).
    pub fn time_until_next(&self) -> Option<Duration> {
        let deadline = self.next_deadline()?;
        let remaining = deadline.saturating_sub(self.clock.now_millis()).max(0);
        Some(Duration::from_millis(remaining.unsigned_abs()))
    }

    /// Remove and return every token whose deadline has passed, earliest first.
    pub fn pop_expired(&self) -> Vec<TimerToken> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        let mut expired = Vec::new();
        while inner.heap.peek().is_some_and(|e| e.deadline <= now) {
            if let Some(entry) = inner.heap.pop() {
                expired.push(entry.token);
            }
        }
        expired
    }

    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.inner.lock().heap.iter().any(|e| e.token == token)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().heap.len()
    }
}

impl Scheduler for TimerQueue {
    fn schedule(&self, token: TimerToken, delay: Duration) {
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let deadline = self.clock.now_millis().saturating_add(delay_ms);
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq = inner.next_seq.wrapping_add(1);
        inner.heap.push(Entry {
            deadline,
            seq,
            token,
        });
    }

    fn cancel(&self, token: TimerToken) {
        self.inner.lock().heap.retain(|e| e.token != token);
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("pending", &self.pending_count())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualClock;

    fn queue() -> (Arc<ManualClock>, TimerQueue) {
        let clock = Arc::new(ManualClock::new(0));
        let queue = TimerQueue::new(clock.clone());
        (clock, queue)
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = TimerToken::next();
        let b = TimerToken::next();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn test_expiry_order() {
        let (clock, queue) = queue();
        let a = TimerToken::next();
        let b = TimerToken::next();
        let c = TimerToken::next();
        queue.schedule(a, Duration::from_millis(300));
        queue.schedule(b, Duration::from_millis(100));
        queue.schedule(c, Duration::from_millis(100));

        assert_eq!(queue.next_deadline(), Some(100));
        assert!(queue.pop_expired().is_empty());

        clock.advance(100);
        assert_eq!(queue.pop_expired(), vec![b, c]);
        assert_eq!(queue.time_until_next(), Some(Duration::from_millis(200)));

        clock.advance(500);
        assert_eq!(queue.time_until_next(), Some(Duration::ZERO));
        assert_eq!(queue.pop_expired(), vec![a]);
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn test_cancel_is_token_scoped() {
        let (clock, queue) = queue();
        let mine = TimerToken::next();
        let theirs = TimerToken::next();
        queue.schedule(mine, Duration::from_millis(10));
        queue.schedule(mine, Duration::from_millis(20));
        queue.schedule(theirs, Duration::from_millis(15));

        queue.cancel(mine);
        assert!(!queue.is_pending(mine));
        assert!(queue.is_pending(theirs));
        assert_eq!(queue.pending_count(), 1);

        clock.advance(50);
        assert_eq!(queue.pop_expired(), vec![theirs]);
    }
}
