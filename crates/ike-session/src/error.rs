// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for session setup.
//!
//! Only fallible setup paths (configuration, thread spawning, worker
//! handoff) return errors. Retransmission ticks, liveness signals and alarm
//! delivery never fail: they report through callbacks or are dropped.

use thiserror::Error;

use crate::alarm::SessionId;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors returned while setting up or driving a session worker.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn thread `{name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("session {0} worker is no longer running")]
    WorkerGone(SessionId),
}

/// Convenient alias for session setup results.
pub type Result<T> = core::result::Result<T, SessionError>;
