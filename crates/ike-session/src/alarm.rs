// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Alarm redelivery to session handlers.
//!
//! Wake-ups scheduled with a platform alarm facility come back on a foreign
//! thread carrying only an action name and a small event that embeds the
//! session id. The [`AlarmDispatcher`] maps that id back to the live session
//! and hands the event over synchronously: `on_alarm_fired` returns only
//! after the session processed it, so any wake lock held by the caller
//! covers the session-side work.
//!
//! ```text
//! platform thread                     session worker
//! on_alarm_fired("...ACTION_DPD", ev)
//!   -> registry[ev.session_id]
//!   -> dispatch_alarm_sync() ------>  handle Alarm{Dpd}
//!      (blocked)            <------   ack
//!   <- Delivered
//! ```

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

/// Numeric session identifier.
pub type SessionId = i32;

/// Closed set of alarm actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmAction {
    DeleteChild,
    RekeyChild,
    DeleteIke,
    RekeyIke,
    Dpd,
    Keepalive,
}

impl AlarmAction {
    /// Every recognized action.
    pub const ALL: [AlarmAction; 6] = [
        AlarmAction::DeleteChild,
        AlarmAction::RekeyChild,
        AlarmAction::DeleteIke,
        AlarmAction::RekeyIke,
        AlarmAction::Dpd,
        AlarmAction::Keepalive,
    ];

    /// Action name carried by the alarm facility.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeleteChild => "IkeAlarmReceiver.ACTION_DELETE_CHILD",
            Self::RekeyChild => "IkeAlarmReceiver.ACTION_REKEY_CHILD",
            Self::DeleteIke => "IkeAlarmReceiver.ACTION_DELETE_IKE",
            Self::RekeyIke => "IkeAlarmReceiver.ACTION_REKEY_IKE",
            Self::Dpd => "IkeAlarmReceiver.ACTION_DPD",
            Self::Keepalive => "IkeAlarmReceiver.ACTION_KEEPALIVE",
        }
    }

    /// Parse an action name; `None` for anything outside the closed set.
    #[must_use]
    pub fn from_action_str(action: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == action)
    }
}

impl fmt::Display for AlarmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event carried through the alarm facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmEvent {
    /// Target session.
    pub session_id: SessionId,
    /// Remote SPI of the SA the alarm was armed for.
    pub remote_spi: u64,
}

impl AlarmEvent {
    #[must_use]
    pub fn new(session_id: SessionId, remote_spi: u64) -> Self {
        Self {
            session_id,
            remote_spi,
        }
    }
}

/// Session-side receiver of alarms.
pub trait SessionEventHandler: Send + Sync {
    /// Process the alarm on the session's own thread and return once done.
    fn dispatch_alarm_sync(&self, action: AlarmAction, event: AlarmEvent);
}

/// Result of [`AlarmDispatcher::on_alarm_fired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The session processed the event.
    Delivered,
    /// Action name outside the closed set.
    UnknownAction,
    /// No session registered under the carried id.
    NoSession,
}

/// Registry of live sessions keyed by session id.
#[derive(Default)]
pub struct AlarmDispatcher {
    sessions: DashMap<SessionId, Arc<dyn SessionEventHandler>>,
}

impl AlarmDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `handler` with `session_id`, replacing any previous one.
    pub fn register_session(&self, session_id: SessionId, handler: Arc<dyn SessionEventHandler>) {
        if self.sessions.insert(session_id, handler).is_some() {
            log::debug!("[AlarmDispatcher] session {} re-registered", session_id);
        }
    }

    pub fn unregister_session(&self, session_id: SessionId) {
        self.sessions.remove(&session_id);
    }

    pub fn is_registered(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Redeliver an alarm to its session, blocking until processed.
    pub fn on_alarm_fired(&self, action: &str, event: AlarmEvent) -> DispatchOutcome {
        let Some(action) = AlarmAction::from_action_str(action) else {
            log::warn!("[AlarmDispatcher] ignoring unknown alarm action {:?}", action);
            return DispatchOutcome::UnknownAction;
        };

        // Clone out of the map: the session may unregister itself while
        // handling the event.
        let handler = match self.sessions.get(&event.session_id) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                log::debug!(
                    "[AlarmDispatcher] {} for closed session {}",
                    action,
                    event.session_id
                );
                return DispatchOutcome::NoSession;
            }
        };

        handler.dispatch_alarm_sync(action, event);
        DispatchOutcome::Delivered
    }
}

impl fmt::Debug for AlarmDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlarmDispatcher")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<(AlarmAction, AlarmEvent)>>,
    }

    impl SessionEventHandler for RecordingHandler {
        fn dispatch_alarm_sync(&self, action: AlarmAction, event: AlarmEvent) {
            self.events.lock().push((action, event));
        }
    }

    #[test]
    fn test_action_names_round_trip() {
        for action in AlarmAction::ALL {
            assert_eq!(AlarmAction::from_action_str(action.as_str()), Some(action));
        }
        assert_eq!(AlarmAction::from_action_str("ACTION_DPD"), None);
    }

    #[test]
    fn test_dispatch_to_registered_session() {
        let dispatcher = AlarmDispatcher::new();
        let handler = Arc::new(RecordingHandler::default());
        dispatcher.register_session(3, handler.clone());

        let event = AlarmEvent::new(3, 0xdead_beef);
        let outcome = dispatcher.on_alarm_fired(AlarmAction::Dpd.as_str(), event);

        assert_eq!(outcome, DispatchOutcome::Delivered);
        assert_eq!(*handler.events.lock(), vec![(AlarmAction::Dpd, event)]);
    }

    #[test]
    fn test_unknown_action_ignored() {
        let dispatcher = AlarmDispatcher::new();
        let handler = Arc::new(RecordingHandler::default());
        dispatcher.register_session(1, handler.clone());

        let outcome = dispatcher.on_alarm_fired("IkeAlarmReceiver.ACTION_REBOOT", AlarmEvent::new(1, 0));
        assert_eq!(outcome, DispatchOutcome::UnknownAction);
        assert!(handler.events.lock().is_empty());
    }

    #[test]
    fn test_unregistered_session_dropped() {
        let dispatcher = AlarmDispatcher::new();
        let handler = Arc::new(RecordingHandler::default());
        dispatcher.register_session(1, handler.clone());
        dispatcher.unregister_session(1);
        assert!(!dispatcher.is_registered(1));

        let outcome =
            dispatcher.on_alarm_fired(AlarmAction::RekeyIke.as_str(), AlarmEvent::new(1, 0));
        assert_eq!(outcome, DispatchOutcome::NoSession);
        assert!(handler.events.lock().is_empty());
    }

    #[test]
    fn test_register_overwrites() {
        let dispatcher = AlarmDispatcher::new();
        let old = Arc::new(RecordingHandler::default());
        let new = Arc::new(RecordingHandler::default());
        dispatcher.register_session(9, old.clone());
        dispatcher.register_session(9, new.clone());
        assert_eq!(dispatcher.session_count(), 1);

        dispatcher.on_alarm_fired(AlarmAction::Keepalive.as_str(), AlarmEvent::new(9, 1));
        assert!(old.events.lock().is_empty());
        assert_eq!(new.events.lock().len(), 1);
    }

    #[test]
    fn test_handler_may_unregister_itself() {
        struct SelfRemoving {
            dispatcher: Arc<AlarmDispatcher>,
        }

        impl SessionEventHandler for SelfRemoving {
            fn dispatch_alarm_sync(&self, _action: AlarmAction, event: AlarmEvent) {
                self.dispatcher.unregister_session(event.session_id);
            }
        }

        let dispatcher = Arc::new(AlarmDispatcher::new());
        dispatcher.register_session(
            4,
            Arc::new(SelfRemoving {
                dispatcher: dispatcher.clone(),
            }),
        );

        let outcome =
            dispatcher.on_alarm_fired(AlarmAction::DeleteIke.as_str(), AlarmEvent::new(4, 0));
        assert_eq!(outcome, DispatchOutcome::Delivered);
        assert!(!dispatcher.is_registered(4));
    }

    #[test]
    fn test_alarms_race_registration_churn() {
        use std::sync::atomic::{AtomicBool, Ordering};

        const ID: SessionId = 12;
        let dispatcher = Arc::new(AlarmDispatcher::new());
        let handler = Arc::new(RecordingHandler::default());
        let done = Arc::new(AtomicBool::new(false));

        let churn = {
            let dispatcher = dispatcher.clone();
            let handler = handler.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                for _ in 0..2_000 {
                    dispatcher.register_session(ID, handler.clone());
                    dispatcher.unregister_session(ID);
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let firers: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                let done = done.clone();
                std::thread::spawn(move || {
                    let mut delivered = 0usize;
                    while !done.load(Ordering::SeqCst) {
                        let outcome = dispatcher
                            .on_alarm_fired(AlarmAction::Dpd.as_str(), AlarmEvent::new(ID, 0));
                        match outcome {
                            DispatchOutcome::Delivered => delivered += 1,
                            DispatchOutcome::NoSession => {}
                            DispatchOutcome::UnknownAction => panic!("action misparsed"),
                        }
                    }
                    delivered
                })
            })
            .collect();

        churn.join().unwrap();
        let delivered: usize = firers.into_iter().map(|t| t.join().unwrap()).sum();

        assert_eq!(handler.events.lock().len(), delivered);
        assert!(!dispatcher.is_registered(ID));
        assert_eq!(
            dispatcher.on_alarm_fired(AlarmAction::Dpd.as_str(), AlarmEvent::new(ID, 0)),
            DispatchOutcome::NoSession
        );
    }
}
