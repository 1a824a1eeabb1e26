// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    Executor, LivenessMetricHelper, LivenessRequestState, LivenessRequestType, LivenessStatus,
};

/// Receives the liveness status stream of one session.
pub trait LivenessObserver: Send + Sync {
    fn on_liveness_status_changed(&self, status: LivenessStatus);
}

/// Coalesces liveness requests into one logical check per session.
///
/// Owned and driven by the session thread. State changes happen before the
/// notification is handed to the executor, so a misbehaving observer cannot
/// affect them.
pub struct LivenessAssister {
    state: LivenessRequestState,
    observer: Arc<dyn LivenessObserver>,
    executor: Arc<dyn Executor>,
    metrics: Arc<Mutex<LivenessMetricHelper>>,
}

impl LivenessAssister {
    pub fn new(
        observer: Arc<dyn LivenessObserver>,
        executor: Arc<dyn Executor>,
        metrics: LivenessMetricHelper,
    ) -> Self {
        Self {
            state: LivenessRequestState::Initial,
            observer,
            executor,
            metrics: Arc::new(Mutex::new(metrics)),
        }
    }

    /// Start a check, or report that one is already running.
    ///
    /// While a check is in flight its type does not change: a background
    /// request during an on-demand check reports `OnDemandOngoing`.
    pub fn liveness_check_requested(&mut self, request: LivenessRequestType) {
        let status = match self.state {
            LivenessRequestState::Initial => {
                self.state = LivenessRequestState::started_by(request);
                match request {
                    LivenessRequestType::OnDemand => LivenessStatus::OnDemandStarted,
                    LivenessRequestType::Background => LivenessStatus::BackgroundStarted,
                }
            }
            LivenessRequestState::OnDemand => LivenessStatus::OnDemandOngoing,
            LivenessRequestState::Background => LivenessStatus::BackgroundOngoing,
        };
        self.notify(status);
    }

    /// The peer answered the in-flight check. No-op without one.
    pub fn mark_peer_as_alive(&mut self) {
        self.complete(LivenessStatus::Success);
    }

    /// The in-flight check failed. No-op without one.
    pub fn mark_peer_as_dead(&mut self) {
        self.complete(LivenessStatus::Failure);
    }

    pub fn is_liveness_check_requested(&self) -> bool {
        self.state != LivenessRequestState::Initial
    }

    pub fn state(&self) -> LivenessRequestState {
        self.state
    }

    fn complete(&mut self, status: LivenessStatus) {
        if self.state == LivenessRequestState::Initial {
            log::debug!("[Liveness] {} ignored, no check in flight", status);
            return;
        }
        self.state = LivenessRequestState::Initial;
        self.notify(status);
    }

    fn notify(&self, status: LivenessStatus) {
        log::debug!("[Liveness] status {}", status);
        let observer = Arc::clone(&self.observer);
        let metrics = Arc::clone(&self.metrics);
        self.executor.execute(Box::new(move || {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
                observer.on_liveness_status_changed(status);
            }));
            if delivered.is_err() {
                log::warn!("[Liveness] observer panicked while handling {}", status);
            }
            let recorded = panic::catch_unwind(AssertUnwindSafe(|| {
                metrics.lock().on_status(status);
            }));
            if recorded.is_err() {
                log::warn!("[Liveness] metrics sink panicked while handling {}", status);
            }
        }));
    }
}
