// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-session serialized event thread.
//!
//! Everything a session owns (retransmitters, liveness assister, timers) is
//! only touched from this thread. Other threads hand events over either
//! fire-and-forget ([`SessionWorker::post`]) or blocking until the event has
//! been processed ([`SessionWorker::dispatch_sync`]).

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::SessionEvent;
use crate::alarm::{AlarmAction, AlarmEvent, SessionEventHandler, SessionId};
use crate::error::{Result, SessionError};
use crate::timer::TimerQueue;

/// State machine driven by a [`SessionWorker`].
pub trait SessionHandler: Send + 'static {
    fn handle_event(&mut self, event: SessionEvent);
}

enum Envelope {
    Event {
        event: SessionEvent,
        ack: Option<Sender<()>>,
    },
    Shutdown,
}

/// Serialized worker thread of one session.
pub struct SessionWorker {
    session_id: SessionId,
    sender: Sender<Envelope>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SessionWorker {
    /// Spawn the worker. `timers` must be the queue `handler` schedules on.
    pub fn spawn<H: SessionHandler>(
        session_id: SessionId,
        handler: H,
        timers: Arc<TimerQueue>,
    ) -> Result<Self> {
        let (sender, receiver) = channel::unbounded();
        let name = format!("ike-session-{}", session_id);
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::run_loop(session_id, receiver, handler, &timers))
            .map_err(|source| SessionError::Spawn { name, source })?;

        Ok(Self {
            session_id,
            sender,
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Queue an event without waiting for it.
    pub fn post(&self, event: SessionEvent) -> Result<()> {
        self.sender
            .send(Envelope::Event { event, ack: None })
            .map_err(|_| SessionError::WorkerGone(self.session_id))
    }

    /// Queue an event and block until the worker has processed it.
    pub fn dispatch_sync(&self, event: SessionEvent) -> Result<()> {
        let (ack_tx, ack_rx) = channel::bounded(1);
        self.sender
            .send(Envelope::Event {
                event,
                ack: Some(ack_tx),
            })
            .map_err(|_| SessionError::WorkerGone(self.session_id))?;
        ack_rx
            .recv()
            .map_err(|_| SessionError::WorkerGone(self.session_id))
    }

    /// Stop the thread after the events already queued. Safe to call twice.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Envelope::Shutdown);
        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            // Joining from the worker itself would deadlock.
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    fn run_loop<H: SessionHandler>(
        session_id: SessionId,
        receiver: Receiver<Envelope>,
        mut handler: H,
        timers: &TimerQueue,
    ) {
        log::debug!("[SessionWorker] {} running", session_id);
        loop {
            for token in timers.pop_expired() {
                handler.handle_event(SessionEvent::Timer(token));
            }

            let received = match timers.time_until_next() {
                Some(wait) => receiver.recv_timeout(wait),
                None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(Envelope::Event { event, ack }) => {
                    handler.handle_event(event);
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Ok(Envelope::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::debug!("[SessionWorker] {} stopped", session_id);
    }
}

impl SessionEventHandler for SessionWorker {
    fn dispatch_alarm_sync(&self, action: AlarmAction, event: AlarmEvent) {
        let event = SessionEvent::Alarm {
            action,
            remote_spi: event.remote_spi,
        };
        if let Err(e) = self.dispatch_sync(event) {
            log::debug!("[SessionWorker] alarm {} dropped: {}", action, e);
        }
    }
}

impl Drop for SessionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{MonotonicClock, Scheduler, TimerToken};
    use std::time::Duration;

    struct Recorder {
        events: Arc<Mutex<Vec<SessionEvent>>>,
        timers: Arc<TimerQueue>,
        token: TimerToken,
    }

    impl SessionHandler for Recorder {
        fn handle_event(&mut self, event: SessionEvent) {
            if event == SessionEvent::LivenessCheckRequested {
                self.timers.schedule(self.token, Duration::from_millis(20));
            }
            self.events.lock().push(event);
        }
    }

    fn spawn_recorder() -> (SessionWorker, Arc<Mutex<Vec<SessionEvent>>>, TimerToken) {
        let timers = Arc::new(TimerQueue::new(Arc::new(MonotonicClock::new())));
        let events = Arc::new(Mutex::new(Vec::new()));
        let token = TimerToken::next();
        let handler = Recorder {
            events: events.clone(),
            timers: timers.clone(),
            token,
        };
        let worker = SessionWorker::spawn(11, handler, timers).unwrap();
        (worker, events, token)
    }

    #[test]
    fn test_dispatch_sync_waits_for_processing() {
        let (worker, events, _) = spawn_recorder();
        worker.post(SessionEvent::NetworkLost).unwrap();
        worker.dispatch_sync(SessionEvent::NetworkRestored).unwrap();
        assert_eq!(
            *events.lock(),
            vec![SessionEvent::NetworkLost, SessionEvent::NetworkRestored]
        );
    }

    #[test]
    fn test_expired_timer_delivered_as_event() {
        let (worker, events, token) = spawn_recorder();
        worker
            .dispatch_sync(SessionEvent::LivenessCheckRequested)
            .unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !events.lock().contains(&SessionEvent::Timer(token)) {
            assert!(std::time::Instant::now() < deadline, "timer never fired");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(worker.session_id(), 11);
    }

    #[test]
    fn test_alarm_handoff_is_synchronous() {
        let (worker, events, _) = spawn_recorder();
        worker.dispatch_alarm_sync(AlarmAction::Keepalive, AlarmEvent::new(11, 42));
        assert_eq!(
            *events.lock(),
            vec![SessionEvent::Alarm {
                action: AlarmAction::Keepalive,
                remote_spi: 42
            }]
        );
    }

    #[test]
    fn test_events_after_shutdown_fail() {
        let (worker, _events, _) = spawn_recorder();
        worker.shutdown();
        worker.shutdown();
        assert!(matches!(
            worker.post(SessionEvent::Close),
            Err(SessionError::WorkerGone(11))
        ));
        assert!(worker.dispatch_sync(SessionEvent::Close).is_err());
    }
}
