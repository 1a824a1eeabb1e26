// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Executors for observer callbacks.

use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;

use crossbeam::channel::{self, Sender};

use crate::error::{Result, SessionError};

/// Boxed callback job.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs callback jobs in submission order.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

/// Runs jobs immediately on the calling thread.
///
/// Statuses are then delivered on the session thread itself, which gives up
/// the off-thread delivery a [`LivenessAssister`](super::LivenessAssister)
/// otherwise provides: an observer that blocks stalls the session. Use it
/// for deterministic tests; sessions should get a [`ThreadExecutor`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Dedicated callback thread draining an unbounded job queue.
///
/// Dropping the executor closes the queue, lets the thread finish the jobs
/// already queued and joins it.
pub struct ThreadExecutor {
    sender: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadExecutor {
    pub fn spawn(name: &str) -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<Job>();
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in receiver {
                    // One failing job must not take the queue down with it.
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        log::warn!("[ThreadExecutor] callback job panicked");
                    }
                }
            })
            .map_err(|source| SessionError::Spawn {
                name: name.to_string(),
                source,
            })?;

        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) {
        let Some(sender) = self.sender.as_ref() else {
            return;
        };
        if sender.send(job).is_err() {
            log::debug!("[ThreadExecutor] callback thread gone, job dropped");
        }
    }
}

impl Drop for ThreadExecutor {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(handle) = self.thread.take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
