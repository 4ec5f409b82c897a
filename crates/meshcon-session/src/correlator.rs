//! Single-slot request/reply correlation.
//!
//! The gateway answers requests in order and without identifiers, so at most
//! one request may be outstanding. The [`Correlator`] lives in the engine and
//! owns the slot; callers hold a [`CorrelatorHandle`] and wait on a oneshot
//! channel that the engine completes when the reply arrives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meshcon_metrics::{metric_defs, metrics};
use meshcon_protocol::LineCodec;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::engine::EngineEvent;
use crate::error::{CorrelatorError, CorrelatorResult};

/// Identifies one request so a late expiry cannot clear a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(pub u64);

/// Channel on which the engine answers one request with the raw reply body.
pub type ReplySender = oneshot::Sender<CorrelatorResult<String>>;

struct PendingRequest {
    token: RequestToken,
    request: String,
    responder: ReplySender,
}

/// What happened to an inbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Handed to the waiting caller.
    Delivered,
    /// No request was pending.
    Orphaned(String),
}

/// The pending-reply slot.
#[derive(Default)]
pub struct Correlator {
    pending: Option<PendingRequest>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a request is waiting for its reply.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Claim the slot for a request and return the bytes to transmit.
    ///
    /// If the slot is taken the caller is answered with
    /// [`CorrelatorError::Busy`] immediately.
    pub fn begin(
        &mut self,
        token: RequestToken,
        request: String,
        responder: ReplySender,
    ) -> CorrelatorResult<Vec<u8>> {
        if let Some(pending) = &self.pending {
            debug!(busy_with = %pending.request, %request, "request refused");
            metrics::counter!(metric_defs::REQUESTS_BUSY.name).increment(1);
            let _ = responder.send(Err(CorrelatorError::Busy));
            return Err(CorrelatorError::Busy);
        }

        let wire = LineCodec::encode_request(&request);
        debug!(%request, "request pending");
        metrics::counter!(metric_defs::REQUESTS_SENT.name).increment(1);
        self.pending = Some(PendingRequest {
            token,
            request,
            responder,
        });
        Ok(wire)
    }

    /// Deliver a reply body to the pending request.
    pub fn resolve(&mut self, reply: String) -> ReplyOutcome {
        match self.pending.take() {
            Some(pending) => match pending.responder.send(Ok(reply)) {
                Ok(()) => ReplyOutcome::Delivered,
                Err(late) => {
                    let reply = late.unwrap_or_default();
                    warn!(request = %pending.request, %reply, "reply arrived after the caller gave up");
                    metrics::counter!(metric_defs::REPLIES_ORPHANED.name).increment(1);
                    ReplyOutcome::Orphaned(reply)
                }
            },
            None => {
                warn!(%reply, "unexpected reply from gateway");
                metrics::counter!(metric_defs::REPLIES_ORPHANED.name).increment(1);
                ReplyOutcome::Orphaned(reply)
            }
        }
    }

    /// Free the slot if it still belongs to `token`. Returns whether it did.
    pub fn expire(&mut self, token: RequestToken) -> bool {
        if self.pending.as_ref().is_some_and(|p| p.token == token) {
            if let Some(pending) = self.pending.take() {
                warn!(request = %pending.request, "no reply from gateway");
                metrics::counter!(metric_defs::REQUESTS_TIMED_OUT.name).increment(1);
                let _ = pending.responder.send(Err(CorrelatorError::NoReply));
            }
            true
        } else {
            false
        }
    }

    /// Fail the pending request, e.g. because the transport went away.
    pub fn abort(&mut self, error: CorrelatorError) {
        if let Some(pending) = self.pending.take() {
            let _ = pending.responder.send(Err(error));
        }
    }
}

/// Caller side of the correlator.
#[derive(Clone)]
pub struct CorrelatorHandle {
    events: mpsc::Sender<EngineEvent>,
    next_token: Arc<AtomicU64>,
    timeout: Duration,
}

impl CorrelatorHandle {
    /// Create a handle that submits requests to the engine queue.
    pub fn new(events: mpsc::Sender<EngineEvent>, timeout: Duration) -> Self {
        CorrelatorHandle {
            events,
            next_token: Arc::new(AtomicU64::new(1)),
            timeout,
        }
    }

    /// Configured reply timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request and wait for the raw reply body.
    ///
    /// Resolves with [`CorrelatorError::NoReply`] after the timeout; the slot
    /// is freed and a reply arriving later is treated as an orphan.
    pub async fn send_and_wait(&self, request: &str) -> CorrelatorResult<String> {
        let token = RequestToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let (responder, reply) = oneshot::channel();

        self.events
            .send(EngineEvent::Request {
                token,
                request: request.to_string(),
                responder,
            })
            .await
            .map_err(|_| CorrelatorError::Closed)?;

        match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CorrelatorError::Closed),
            Err(_) => {
                let _ = self.events.send(EngineEvent::Expire { token }).await;
                Err(CorrelatorError::NoReply)
            }
        }
    }
}
