// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request retransmission on a fixed backoff schedule.
//!
//! A [`Retransmitter`] owns one outstanding request and resends it until the
//! owner stops it (response received), suspends it (network lost) or the
//! schedule runs out.
//!
//! ## Lifecycle
//!
//! ```text
//!            suspend               stop
//! Allowed ----------> Suspended ---------> Finished
//!    ^                    |                  ^
//!    +------restart-------+                  |
//!    +----------------------stop-------------+
//! ```
//!
//! `Finished` is absorbing. Running out of schedule does not change the
//! state: it calls
//! [`RetransmitHandler::handle_retransmission_failure`] and the owner decides
//! what to do (normally stop the retransmitter and fail the request).
//!
//! ## Timing
//!
//! With schedule `[1000, 2000, 4000]` and every tick delivered on time:
//!
//! ```text
//! t=0     send #1, arm 1000ms
//! t=1000  send #2, arm 2000ms
//! t=3000  send #3, arm 4000ms
//! t=7000  schedule exhausted -> handle_retransmission_failure()
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::timer::{Scheduler, TimerToken};

/// Retransmission lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetransmitterState {
    /// Retransmission may proceed.
    #[default]
    Allowed,
    /// Paused; [`Retransmitter::restart_retransmitting`] resumes from attempt 0.
    Suspended,
    /// Terminal.
    Finished,
}

/// Side effects a retransmitter drives.
pub trait RetransmitHandler<M> {
    /// Write the tracked message to the transport.
    fn send(&mut self, message: &M);

    /// The schedule is exhausted without a response.
    fn handle_retransmission_failure(&mut self, message: &M);
}

/// Resends one immutable message on a backoff schedule.
pub struct Retransmitter<M, H> {
    scheduler: Arc<dyn Scheduler>,
    token: TimerToken,
    message: M,
    schedule: Vec<u32>,
    attempt_count: usize,
    state: RetransmitterState,
    handler: H,
}

impl<M, H: RetransmitHandler<M>> Retransmitter<M, H> {
    /// Create a retransmitter in `Allowed` state. Nothing is sent until the
    /// first [`retransmit`](Self::retransmit).
    ///
    /// An empty schedule is accepted; the first tick then reports failure.
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        message: M,
        schedule: impl Into<Vec<u32>>,
        handler: H,
    ) -> Self {
        Self {
            scheduler,
            token: TimerToken::next(),
            message,
            schedule: schedule.into(),
            attempt_count: 0,
            state: RetransmitterState::Allowed,
            handler,
        }
    }

    /// Send (or resend) the message and arm the next tick.
    pub fn retransmit(&mut self) {
        if self.state != RetransmitterState::Allowed {
            return;
        }

        let Some(&timeout_ms) = self.schedule.get(self.attempt_count) else {
            log::warn!(
                "[Retransmitter] {} gave up after {} attempts",
                self.token,
                self.attempt_count
            );
            self.handler.handle_retransmission_failure(&self.message);
            return;
        };

        self.handler.send(&self.message);
        self.scheduler
            .schedule(self.token, Duration::from_millis(u64::from(timeout_ms)));
        self.attempt_count += 1;
        log::debug!(
            "[Retransmitter] {} attempt {} sent, next tick in {}ms",
            self.token,
            self.attempt_count,
            timeout_ms
        );
    }

    /// Cancel pending ticks and finish. Irreversible.
    pub fn stop_retransmitting(&mut self) {
        self.scheduler.cancel(self.token);
        self.state = RetransmitterState::Finished;
    }

    /// Pause retransmission. Only effective from `Allowed`.
    pub fn suspend_retransmitting(&mut self) {
        if self.state != RetransmitterState::Allowed {
            return;
        }
        self.scheduler.cancel(self.token);
        self.state = RetransmitterState::Suspended;
        log::debug!("[Retransmitter] {} suspended", self.token);
    }

    /// Resume from `Suspended` with a fresh schedule and send immediately.
    pub fn restart_retransmitting(&mut self) {
        if self.state != RetransmitterState::Suspended {
            return;
        }
        self.attempt_count = 0;
        self.state = RetransmitterState::Allowed;
        log::debug!("[Retransmitter] {} restarted", self.token);
        self.retransmit();
    }
}

impl<M, H> Retransmitter<M, H> {
    /// The tracked message, unchanged since construction.
    #[must_use]
    pub fn message(&self) -> &M {
        &self.message
    }

    /// Token carried by this instance's ticks.
    #[must_use]
    pub fn token(&self) -> TimerToken {
        self.token
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RetransmitterState {
        self.state
    }

    /// Sends made since creation or the last restart.
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.attempt_count
    }

    /// Relative timeouts in milliseconds, one per attempt.
    #[must_use]
    pub fn schedule(&self) -> &[u32] {
        &self.schedule
    }

    /// Side-effect handler, e.g. to inspect state it recorded.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<M, H> Drop for Retransmitter<M, H> {
    fn drop(&mut self) {
        // A dropped retransmitter must not leave ticks behind.
        if self.state != RetransmitterState::Finished {
            self.scheduler.cancel(self.token);
        }
    }
}
