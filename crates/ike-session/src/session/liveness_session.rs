// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Liveness touchpoints of the session state machine.
//!
//! A liveness check is a DPD exchange: an empty INFORMATIONAL request that
//! the peer must answer. The request is resent by a [`Retransmitter`]; the
//! [`LivenessAssister`] turns the outcome into the observer's status stream.
//!
//! | Event                          | Effect                                   |
//! |--------------------------------|------------------------------------------|
//! | `LivenessCheckRequested`       | on-demand check (or `*Ongoing`)          |
//! | DPD alarm / DPD timer          | background check (or `*Ongoing`)         |
//! | retransmit tick                | resend, or give up -> `Failure` + close  |
//! | `ResponseReceived` (same id)   | `Success`, DPD timer re-armed            |
//! | `NetworkLost` / `NetworkRestored` | suspend / restart retransmission      |
//! | keepalive alarm / timer        | NAT keepalive sent, timer re-armed       |
//! | `DeleteIke` alarm / `Close`    | session closed, later events ignored     |

use std::sync::Arc;

use super::{SessionContext, SessionEvent, SessionHandler};
use crate::alarm::{AlarmAction, AlarmDispatcher, SessionId};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::liveness::{LivenessAssister, LivenessMetricHelper, LivenessRequestType};
use crate::retransmit::{RetransmitHandler, Retransmitter};
use crate::timer::{Scheduler, TimerQueue, TimerToken};

/// Outbound side of the session's transport.
pub trait Transport: Send + Sync {
    /// Send (or resend) the DPD request with this message id.
    fn send_liveness_request(&self, session_id: SessionId, message_id: u32);

    /// Send one NAT keepalive packet.
    fn send_nat_keepalive(&self, session_id: SessionId);
}

/// DPD request tracked by the retransmitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DpdRequest {
    pub message_id: u32,
}

struct DpdSender {
    session_id: SessionId,
    transport: Arc<dyn Transport>,
    exhausted: bool,
}

impl RetransmitHandler<DpdRequest> for DpdSender {
    fn send(&mut self, message: &DpdRequest) {
        self.transport
            .send_liveness_request(self.session_id, message.message_id);
    }

    fn handle_retransmission_failure(&mut self, _message: &DpdRequest) {
        self.exhausted = true;
    }
}

/// Liveness part of one IKE session, driven by a
/// [`SessionWorker`](super::SessionWorker).
pub struct LivenessSession {
    session_id: SessionId,
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<AlarmDispatcher>,
    timers: Arc<TimerQueue>,
    assister: LivenessAssister,
    pending: Option<Retransmitter<DpdRequest, DpdSender>>,
    next_message_id: u32,
    dpd_token: TimerToken,
    keepalive_token: TimerToken,
    closed: bool,
}

impl LivenessSession {
    /// Build the session and arm its DPD and keepalive timers on `timers`.
    pub fn new(ctx: SessionContext, timers: Arc<TimerQueue>) -> Result<Self> {
        ctx.config.validate()?;

        let metrics = LivenessMetricHelper::new(ctx.clock, ctx.metrics_sink);
        let mut session = Self {
            session_id: ctx.session_id,
            config: ctx.config,
            transport: ctx.transport,
            dispatcher: ctx.dispatcher,
            timers,
            assister: LivenessAssister::new(ctx.observer, ctx.executor, metrics),
            pending: None,
            next_message_id: 0,
            dpd_token: TimerToken::next(),
            keepalive_token: TimerToken::next(),
            closed: false,
        };
        session.arm_dpd();
        session.arm_keepalive();
        Ok(session)
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The DPD request currently awaiting an answer.
    pub fn pending_request(&self) -> Option<&DpdRequest> {
        self.pending.as_ref().map(Retransmitter::message)
    }

    pub fn assister(&self) -> &LivenessAssister {
        &self.assister
    }

    fn request_liveness_check(&mut self, request: LivenessRequestType) {
        let in_flight = self.assister.is_liveness_check_requested();
        self.assister.liveness_check_requested(request);
        if in_flight {
            return;
        }

        self.timers.cancel(self.dpd_token);
        let message_id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);

        let sender = DpdSender {
            session_id: self.session_id,
            transport: Arc::clone(&self.transport),
            exhausted: false,
        };
        let mut retransmitter = Retransmitter::new(
            self.timers.clone(),
            DpdRequest { message_id },
            self.config.retransmit_timeouts_ms.clone(),
            sender,
        );
        retransmitter.retransmit();
        self.pending = Some(retransmitter);
        self.check_exhausted();
    }

    fn on_retransmit_tick(&mut self) {
        if let Some(retransmitter) = self.pending.as_mut() {
            retransmitter.retransmit();
        }
        self.check_exhausted();
    }

    fn check_exhausted(&mut self) {
        if self.pending.as_ref().is_some_and(|r| r.handler().exhausted) {
            log::warn!(
                "[Session] {} peer did not answer liveness check",
                self.session_id
            );
            self.on_peer_dead();
        }
    }

    fn on_peer_dead(&mut self) {
        if let Some(mut retransmitter) = self.pending.take() {
            retransmitter.stop_retransmitting();
        }
        self.assister.mark_peer_as_dead();
        self.close();
    }

    fn on_response(&mut self, message_id: u32) {
        let expected = self
            .pending
            .as_ref()
            .is_some_and(|r| r.message().message_id == message_id);
        if !expected {
            log::debug!(
                "[Session] {} ignoring response with message id {}",
                self.session_id,
                message_id
            );
            return;
        }

        if let Some(mut retransmitter) = self.pending.take() {
            retransmitter.stop_retransmitting();
        }
        self.assister.mark_peer_as_alive();
        self.arm_dpd();
    }

    fn arm_dpd(&mut self) {
        self.timers.cancel(self.dpd_token);
        if let Some(delay) = self.config.dpd_delay() {
            self.timers.schedule(self.dpd_token, delay);
        }
    }

    fn arm_keepalive(&mut self) {
        self.timers.cancel(self.keepalive_token);
        if let Some(delay) = self.config.nat_keepalive_delay() {
            self.timers.schedule(self.keepalive_token, delay);
        }
    }

    fn send_keepalive(&mut self) {
        self.transport.send_nat_keepalive(self.session_id);
        self.arm_keepalive();
    }

    fn handle_alarm(&mut self, action: AlarmAction) {
        match action {
            AlarmAction::Dpd => self.request_liveness_check(LivenessRequestType::Background),
            AlarmAction::Keepalive => self.send_keepalive(),
            AlarmAction::DeleteIke => self.close(),
            AlarmAction::DeleteChild | AlarmAction::RekeyChild | AlarmAction::RekeyIke => {
                log::debug!(
                    "[Session] {} alarm {} left to the SA state machine",
                    self.session_id,
                    action
                );
            }
        }
    }

    fn handle_timer(&mut self, token: TimerToken) {
        if self.pending.as_ref().is_some_and(|r| r.token() == token) {
            self.on_retransmit_tick();
        } else if token == self.dpd_token {
            self.request_liveness_check(LivenessRequestType::Background);
        } else if token == self.keepalive_token {
            self.send_keepalive();
        } else {
            log::debug!("[Session] {} stale {}", self.session_id, token);
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(mut retransmitter) = self.pending.take() {
            retransmitter.stop_retransmitting();
        }
        // An in-flight check ends with the session.
        self.assister.mark_peer_as_dead();
        self.timers.cancel(self.dpd_token);
        self.timers.cancel(self.keepalive_token);
        self.dispatcher.unregister_session(self.session_id);
        log::info!("[Session] {} closed", self.session_id);
    }
}

impl SessionHandler for LivenessSession {
    fn handle_event(&mut self, event: SessionEvent) {
        if self.closed {
            log::debug!("[Session] {} closed, ignoring {:?}", self.session_id, event);
            return;
        }

        match event {
            SessionEvent::LivenessCheckRequested => {
                self.request_liveness_check(LivenessRequestType::OnDemand);
            }
            SessionEvent::Alarm { action, .. } => self.handle_alarm(action),
            SessionEvent::Timer(token) => self.handle_timer(token),
            SessionEvent::ResponseReceived { message_id } => self.on_response(message_id),
            SessionEvent::NetworkLost => {
                if let Some(retransmitter) = self.pending.as_mut() {
                    retransmitter.suspend_retransmitting();
                }
            }
            SessionEvent::NetworkRestored => {
                if let Some(retransmitter) = self.pending.as_mut() {
                    retransmitter.restart_retransmitting();
                }
                self.check_exhausted();
            }
            SessionEvent::Close => self.close(),
        }
    }
}
