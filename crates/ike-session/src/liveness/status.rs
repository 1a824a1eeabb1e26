// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::fmt;

/// Status reported to the liveness observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LivenessStatus {
    /// An on-demand check started.
    OnDemandStarted,
    /// Another request arrived while an on-demand check was running.
    OnDemandOngoing,
    /// A background check started.
    BackgroundStarted,
    /// Another request arrived while a background check was running.
    BackgroundOngoing,
    /// The peer answered.
    Success,
    /// The peer did not answer.
    Failure,
}

impl LivenessStatus {
    #[must_use]
    pub fn is_started(self) -> bool {
        matches!(self, Self::OnDemandStarted | Self::BackgroundStarted)
    }

    #[must_use]
    pub fn is_ongoing(self) -> bool {
        matches!(self, Self::OnDemandOngoing | Self::BackgroundOngoing)
    }

    /// `Success` or `Failure`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

impl fmt::Display for LivenessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OnDemandStarted => "on-demand started",
            Self::OnDemandOngoing => "on-demand ongoing",
            Self::BackgroundStarted => "background started",
            Self::BackgroundOngoing => "background ongoing",
            Self::Success => "success",
            Self::Failure => "failure",
        };
        f.write_str(name)
    }
}

/// Who asked for a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LivenessRequestType {
    /// Explicit application request.
    OnDemand,
    /// Session maintenance (idle DPD timer).
    Background,
}

/// Liveness check in flight, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LivenessRequestState {
    #[default]
    Initial,
    OnDemand,
    Background,
}

impl LivenessRequestState {
    pub(crate) fn started_by(request: LivenessRequestType) -> Self {
        match request {
            LivenessRequestType::OnDemand => Self::OnDemand,
            LivenessRequestType::Background => Self::Background,
        }
    }
}
