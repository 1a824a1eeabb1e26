// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Retransmitter driven by a real timer queue on a manual clock.

use std::sync::Arc;

use ike_session::{
    Clock, ManualClock, RetransmitHandler, Retransmitter, RetransmitterState, TimerQueue,
};

#[derive(Default)]
struct Log {
    sends: Vec<i64>,
    failures: Vec<i64>,
}

struct TimedHandler {
    clock: Arc<ManualClock>,
    log: Log,
}

impl RetransmitHandler<&'static str> for TimedHandler {
    fn send(&mut self, _message: &&'static str) {
        self.log.sends.push(self.clock.now_millis());
    }

    fn handle_retransmission_failure(&mut self, _message: &&'static str) {
        self.log.failures.push(self.clock.now_millis());
    }
}

struct Bench {
    clock: Arc<ManualClock>,
    timers: Arc<TimerQueue>,
    retransmitter: Retransmitter<&'static str, TimedHandler>,
}

impl Bench {
    fn new(schedule: &[u32]) -> Self {
        let clock = Arc::new(ManualClock::new(0));
        let timers = Arc::new(TimerQueue::new(clock.clone()));
        let handler = TimedHandler {
            clock: clock.clone(),
            log: Log::default(),
        };
        let retransmitter =
            Retransmitter::new(timers.clone(), "INFORMATIONAL", schedule.to_vec(), handler);
        Self {
            clock,
            timers,
            retransmitter,
        }
    }

    /// Step the clock one millisecond at a time up to `until`, delivering ticks.
    fn run_until(&mut self, until: i64) {
        while self.clock.now_millis() < until {
            self.clock.advance(1);
            for token in self.timers.pop_expired() {
                assert_eq!(token, self.retransmitter.token());
                self.retransmitter.retransmit();
            }
        }
    }

    fn log(&self) -> &Log {
        &self.retransmitter.handler().log
    }
}

#[test]
fn test_unanswered_request_follows_schedule() {
    let mut bench = Bench::new(&[1000, 2000, 4000]);
    bench.retransmitter.retransmit();
    bench.run_until(10_000);

    assert_eq!(bench.log().sends, vec![0, 1000, 3000]);
    assert_eq!(bench.log().failures, vec![7000]);
    assert_eq!(bench.retransmitter.attempt_count(), 3);
    assert_eq!(bench.timers.pending_count(), 0);
}

#[test]
fn test_stop_cancels_pending_tick() {
    let mut bench = Bench::new(&[1000, 2000, 4000]);
    bench.retransmitter.retransmit();
    bench.run_until(1500);
    bench.retransmitter.stop_retransmitting();
    bench.run_until(20_000);

    assert_eq!(bench.log().sends, vec![0, 1000]);
    assert!(bench.log().failures.is_empty());
    assert_eq!(bench.retransmitter.state(), RetransmitterState::Finished);
    assert!(bench.timers.next_deadline().is_none());
}

#[test]
fn test_suspend_and_restart_mid_schedule() {
    let mut bench = Bench::new(&[1000, 2000, 4000]);
    bench.retransmitter.retransmit();
    bench.run_until(1500);
    bench.retransmitter.suspend_retransmitting();
    bench.run_until(5000);
    assert_eq!(bench.log().sends, vec![0, 1000]);

    bench.retransmitter.restart_retransmitting();
    bench.run_until(20_000);
    assert_eq!(bench.log().sends, vec![0, 1000, 5000, 6000, 8000]);
    assert_eq!(bench.log().failures, vec![12_000]);
}

#[test]
fn test_dropping_retransmitter_cancels_tick() {
    let bench = Bench::new(&[1000]);
    let Bench {
        timers,
        mut retransmitter,
        ..
    } = bench;
    retransmitter.retransmit();
    assert_eq!(timers.pending_count(), 1);
    drop(retransmitter);
    assert_eq!(timers.pending_count(), 0);
}
