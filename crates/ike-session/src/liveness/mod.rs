// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Peer liveness checking.
//!
//! A session runs at most one liveness check (a DPD exchange) at a time.
//! Requests come from two directions: the application asking explicitly
//! (on-demand) and the session's own idle timer (background). The
//! [`LivenessAssister`] folds them into a single status stream:
//!
//! ```text
//! request(OnDemand)   -> OnDemandStarted
//! request(Background) -> OnDemandOngoing      (first caller's type sticks)
//! peer answered       -> Success
//! peer answered again -> (nothing, no check in flight)
//! ```
//!
//! Statuses are delivered on an [`Executor`] and each one is also fed to the
//! [`LivenessMetricHelper`]. A [`ThreadExecutor`] keeps delivery off the
//! session thread; [`InlineExecutor`] does not and is meant for tests.

mod assister;
mod executor;
mod metrics;
mod status;

pub use assister::{LivenessAssister, LivenessObserver};
pub use executor::{Executor, InlineExecutor, Job, ThreadExecutor};
pub use metrics::{LivenessMetricHelper, LivenessMetricsSink, NoopMetricsSink};
pub use status::{LivenessRequestState, LivenessRequestType, LivenessStatus};
