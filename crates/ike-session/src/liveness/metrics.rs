// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-check liveness measurements.
//!
//! One sample spans one logical check: it opens on `*Started`, counts
//! `*Ongoing` overlaps, and closes on `Success`/`Failure` with a single
//! record to the sink. Samples whose elapsed time is negative or does not
//! fit in an `i32` are dropped (clock anomaly).

use std::sync::Arc;

use super::LivenessStatus;
use crate::timer::Clock;

/// Receives one record per completed liveness check.
pub trait LivenessMetricsSink: Send + Sync {
    fn on_liveness_check_completed(&self, elapsed_millis: i32, overlap_count: u32, success: bool);
}

/// Sink discarding every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl LivenessMetricsSink for NoopMetricsSink {
    fn on_liveness_check_completed(&self, _: i32, _: u32, _: bool) {}
}

#[derive(Debug, Clone, Copy)]
struct LivenessMetricSample {
    start_millis: i64,
    overlap_count: u32,
}

/// Measures elapsed time and overlap count of the in-flight check.
pub struct LivenessMetricHelper {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn LivenessMetricsSink>,
    sample: Option<LivenessMetricSample>,
}

impl LivenessMetricHelper {
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn LivenessMetricsSink>) -> Self {
        Self {
            clock,
            sink,
            sample: None,
        }
    }

    /// Feed one notified status.
    pub fn on_status(&mut self, status: LivenessStatus) {
        match status {
            LivenessStatus::OnDemandStarted | LivenessStatus::BackgroundStarted => {
                self.sample = Some(LivenessMetricSample {
                    start_millis: self.clock.now_millis(),
                    overlap_count: 0,
                });
            }
            LivenessStatus::OnDemandOngoing | LivenessStatus::BackgroundOngoing => {
                match self.sample.as_mut() {
                    Some(sample) => sample.overlap_count = sample.overlap_count.saturating_add(1),
                    None => log::debug!("[LivenessMetrics] {} without a started check", status),
                }
            }
            LivenessStatus::Success | LivenessStatus::Failure => {
                let success = status == LivenessStatus::Success;
                self.complete(success);
            }
        }
    }

    /// Whether a check is currently being measured.
    pub fn has_sample(&self) -> bool {
        self.sample.is_some()
    }

    fn complete(&mut self, success: bool) {
        let Some(sample) = self.sample.take() else {
            log::debug!("[LivenessMetrics] completion without a started check");
            return;
        };

        let elapsed = self.clock.now_millis().saturating_sub(sample.start_millis);
        match i32::try_from(elapsed) {
            Ok(elapsed_millis) if elapsed_millis >= 0 => {
                self.sink
                    .on_liveness_check_completed(elapsed_millis, sample.overlap_count, success);
            }
            _ => {
                log::warn!(
                    "[LivenessMetrics] discarding sample with invalid elapsed time {}ms",
                    elapsed
                );
            }
        }
    }
}
