// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Token-keyed timer facility.
//!
//! Every timer user (a retransmitter, the DPD or keepalive timer of a
//! session) owns a [`TimerToken`]. Scheduling arms a wake-up for that token
//! and cancelling removes every pending wake-up for that token only, so
//! several users can share one [`TimerQueue`] without cancelling each
//! other's work.
//!
//! ```text
//! Retransmitter A --schedule(tok_a, 500ms)--+
//! Retransmitter B --schedule(tok_b, 1s)-----+--> TimerQueue (min-heap)
//! DPD timer       --schedule(tok_dpd, 120s)-+         |
//!                                                     v pop_expired(now)
//!                                          SessionWorker -> Timer(token)
//! ```

mod clock;
mod queue;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use queue::{Scheduler, TimerQueue, TimerToken};
