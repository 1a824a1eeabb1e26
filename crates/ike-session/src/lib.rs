// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! IKEv2 session reliability helpers
//!
//! Three pieces sit between an IKE session state machine and the outside
//! world:
//!
//! - **Retransmitter**: resends an outstanding request on a fixed backoff
//!   schedule until it is answered, suspended or given up on.
//! - **Liveness assister**: turns liveness check requests and their outcome
//!   into a status stream for the application, plus one metric sample per
//!   completed check.
//! - **Alarm dispatcher**: routes alarm wake-ups back to the owning session
//!   and blocks until the session has handled them.
//!
//! [`session`] wires them together on a per-session worker thread.
//!
//! # Configuration File
//!
//! ```toml
//! retransmit_timeouts_ms = [500, 1000, 2000, 4000, 8000]
//! dpd_delay_secs = 120
//! nat_keepalive = true
//! nat_keepalive_delay_secs = 20
//! ```

pub mod alarm;
pub mod config;
pub mod error;
pub mod liveness;
pub mod retransmit;
pub mod session;
pub mod timer;

pub use alarm::{AlarmAction, AlarmDispatcher, AlarmEvent, DispatchOutcome, SessionEventHandler, SessionId};
pub use config::SessionConfig;
pub use error::{ConfigError, Result, SessionError};
pub use liveness::{
    LivenessAssister, LivenessMetricHelper, LivenessMetricsSink, LivenessObserver,
    LivenessRequestType, LivenessStatus,
};
pub use retransmit::{RetransmitHandler, Retransmitter, RetransmitterState};
pub use session::{spawn_session, SessionContext, SessionEvent, SessionWorker, Transport};
pub use timer::{Clock, ManualClock, MonotonicClock, Scheduler, TimerQueue, TimerToken};
