// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session wiring: serialized worker and the liveness touchpoints of the
//! session state machine.
//!
//! # Architecture
//!
//! ```text
//! +-------------------+     dispatch_sync / post     +-------------------+
//! | AlarmDispatcher   | ---------------------------> |  SessionWorker    |
//! | application       |                              |  (one thread)     |
//! | peer receive path |                              |   TimerQueue      |
//! +-------------------+                              |   LivenessSession |
//!                                                    |    Retransmitter  |
//!                                                    |    LivenessAssister
//!                                                    +---------+---------+
//!                                                              | Executor
//!                                                              v
//!                                                   LivenessObserver + metrics
//! ```

mod liveness_session;
mod worker;

use std::sync::Arc;

pub use liveness_session::{DpdRequest, LivenessSession, Transport};
pub use worker::{SessionHandler, SessionWorker};

use crate::alarm::{AlarmAction, AlarmDispatcher, SessionId};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::liveness::{Executor, LivenessMetricsSink, LivenessObserver};
use crate::timer::{Clock, TimerQueue, TimerToken};

/// Events processed on a session's worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Alarm redelivered by the [`AlarmDispatcher`].
    Alarm {
        action: AlarmAction,
        remote_spi: u64,
    },
    /// A timer armed on the session's [`TimerQueue`] expired.
    Timer(TimerToken),
    /// The application asked for a liveness check.
    LivenessCheckRequested,
    /// The peer answered the request with this message id.
    ResponseReceived { message_id: u32 },
    /// The underlying network went away; pause retransmissions.
    NetworkLost,
    /// A usable network is back; resume retransmissions.
    NetworkRestored,
    /// Tear the session down.
    Close,
}

/// Collaborators of one session.
#[derive(Clone)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub config: SessionConfig,
    pub clock: Arc<dyn Clock>,
    pub transport: Arc<dyn Transport>,
    pub observer: Arc<dyn LivenessObserver>,
    pub executor: Arc<dyn Executor>,
    pub metrics_sink: Arc<dyn LivenessMetricsSink>,
    pub dispatcher: Arc<AlarmDispatcher>,
}

/// Create a liveness session on its own worker and register it for alarms.
pub fn spawn_session(ctx: SessionContext) -> Result<Arc<SessionWorker>> {
    let session_id = ctx.session_id;
    let dispatcher = Arc::clone(&ctx.dispatcher);
    let timers = Arc::new(TimerQueue::new(Arc::clone(&ctx.clock)));
    let session = LivenessSession::new(ctx, Arc::clone(&timers))?;
    let worker = Arc::new(SessionWorker::spawn(session_id, session, timers)?);
    dispatcher.register_session(session_id, worker.clone());
    log::info!("[Session] {} started", session_id);
    Ok(worker)
}
