//! The session engine: sole owner of the node table.
//!
//! Every mutation of the table happens here, either synchronously (replay,
//! tests) or from the [`SessionEngine::run`] loop consuming [`EngineEvent`]s
//! in arrival order.

use meshcon_metrics::{metric_defs, metrics};
use meshcon_protocol::{AdminCommand, ConsoleCommand, InboundMessage, ProtocolError, Timestamp};
use meshcon_telemetry::{NodeTable, StatusEffect, TelemetryAggregator};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::checker::ChangeChecker;
use crate::config::SessionConfig;
use crate::correlator::{Correlator, CorrelatorHandle, ReplyOutcome, ReplySender, RequestToken};
use crate::dispatcher::AdminOutcome;
use crate::error::{CorrelatorError, SessionError, SessionResult};
use crate::notifier::NotifierHandle;
use crate::replay::ReplayEntry;
use crate::transcript::Origin;

// ============================================================================
// Events
// ============================================================================

/// Work item for the engine task.
pub enum EngineEvent {
    /// A line received from the gateway.
    Transport { timestamp: Timestamp, line: String },
    /// A local administrative command from the operator.
    Admin {
        timestamp: Timestamp,
        command: AdminCommand,
        responder: oneshot::Sender<AdminOutcome>,
    },
    /// A request to forward to the gateway.
    Request {
        token: RequestToken,
        request: String,
        responder: ReplySender,
    },
    /// The caller of `token` stopped waiting.
    Expire { token: RequestToken },
    /// Copy of the current table, for rendering.
    Snapshot(oneshot::Sender<NodeTable>),
}

/// Whether a line is live traffic or re-driven from a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    Live,
    Replay,
}

/// What the engine did with one gateway line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// A status was applied to the table.
    Status(StatusEffect),
    /// A reply was handed to the waiting request.
    Reply(ReplyOutcome),
    /// A reply read back during replay.
    SkippedReply,
    /// The line was unclassifiable or malformed.
    Rejected(ProtocolError),
}

/// Counts of what a replay re-drove.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub status_lines: usize,
    pub skipped_replies: usize,
    pub rejected_lines: usize,
    pub admin_commands: usize,
    pub skipped_requests: usize,
}

fn reject_reason(error: &ProtocolError) -> &'static str {
    match error {
        ProtocolError::UnexpectedTag(_) | ProtocolError::Empty => "unexpected_tag",
        ProtocolError::UnknownStatus(_) => "unknown_status",
        ProtocolError::BufferOverflow { .. } => "overflow",
        _ => "malformed",
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Node table plus everything that mutates or observes it.
pub struct SessionEngine {
    table: NodeTable,
    aggregator: TelemetryAggregator,
    checker: ChangeChecker,
    correlator: Correlator,
    prune_timeout_secs: f64,
    notifier: Option<NotifierHandle>,
    outbound: Option<mpsc::Sender<Vec<u8>>>,
}

impl SessionEngine {
    /// Create an engine with an empty table and no collaborators attached.
    pub fn new(config: &SessionConfig) -> Self {
        SessionEngine {
            table: NodeTable::new(),
            aggregator: TelemetryAggregator::new(config.telemetry.clone()),
            checker: ChangeChecker::from_checks(&config.checks),
            correlator: Correlator::new(),
            prune_timeout_secs: config.session.prune_timeout_secs,
            notifier: None,
            outbound: None,
        }
    }

    /// Send fired checks to this notifier.
    pub fn with_notifier(mut self, notifier: NotifierHandle) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Write requests to this transport queue.
    pub fn with_outbound(mut self, outbound: mpsc::Sender<Vec<u8>>) -> Self {
        self.outbound = Some(outbound);
        self
    }

    /// Current node table.
    pub fn table(&self) -> &NodeTable {
        &self.table
    }

    /// Take the table, ending the engine.
    pub fn into_table(self) -> NodeTable {
        self.table
    }

    /// Whether a request is waiting for its reply.
    pub fn request_pending(&self) -> bool {
        self.correlator.is_pending()
    }

    /// Classify and process one gateway line.
    pub fn process_transport_line(
        &mut self,
        timestamp: Timestamp,
        line: &str,
        mode: ProcessingMode,
    ) -> LineOutcome {
        if mode == ProcessingMode::Live {
            metrics::counter!(metric_defs::TRANSPORT_LINES.name).increment(1);
        }

        let message = match InboundMessage::parse(line) {
            Ok(message) => message,
            Err(error) => {
                warn!(%error, %line, "dropping gateway line");
                metrics::counter!(metric_defs::TRANSPORT_REJECTED.name, "reason" => reject_reason(&error))
                    .increment(1);
                return LineOutcome::Rejected(error);
            }
        };

        match message {
            InboundMessage::Status(status) => {
                let effect = self.aggregator.process_status(&mut self.table, timestamp, &status);
                if mode == ProcessingMode::Live && matches!(effect, StatusEffect::Node(_)) {
                    self.run_checks();
                }
                LineOutcome::Status(effect)
            }
            InboundMessage::Reply(_) if mode == ProcessingMode::Replay => LineOutcome::SkippedReply,
            InboundMessage::Reply(body) => LineOutcome::Reply(self.correlator.resolve(body)),
        }
    }

    fn run_checks(&mut self) {
        for notification in self.checker.check(&self.table) {
            match &self.notifier {
                Some(notifier) => {
                    notifier.notify(notification);
                }
                None => debug!(text = %notification.text, "no notifier attached"),
            }
        }
    }

    /// Apply an administrative command.
    pub fn apply_admin(&mut self, timestamp: Timestamp, command: &AdminCommand) -> AdminOutcome {
        match command {
            AdminCommand::Name { address, name } => match self.table.rename(*address, name) {
                Ok(()) => AdminOutcome::Renamed {
                    address: *address,
                    name: name.clone(),
                },
                Err(error) => {
                    warn!(%error, "rename failed");
                    AdminOutcome::UnknownAddress(*address)
                }
            },
            AdminCommand::Prune => {
                let pruned = self.table.prune(timestamp, self.prune_timeout_secs);
                for address in &pruned {
                    info!(%address, "pruned node");
                }
                metrics::gauge!(metric_defs::NODES_TRACKED.name).set(self.table.len() as f64);
                AdminOutcome::Pruned(pruned)
            }
            AdminCommand::SessionReset => {
                self.table.session_reset();
                info!("session state reset");
                AdminOutcome::SessionReset
            }
        }
    }

    /// Rebuild state from merged transcripts.
    ///
    /// Statuses are applied without running checks, replies are skipped and
    /// only administrative operator lines are re-applied. Checks are primed
    /// from the rebuilt table at the end so live traffic fires only on
    /// genuine changes.
    pub fn replay(&mut self, entries: &[ReplayEntry]) -> ReplaySummary {
        let mut summary = ReplaySummary::default();

        for replayed in entries {
            let timestamp = replayed.entry.timestamp;
            let text = replayed.entry.text.as_str();
            metrics::counter!(metric_defs::REPLAYED_ENTRIES.name, "origin" => replayed.origin.as_str())
                .increment(1);

            match replayed.origin {
                Origin::Transport => {
                    match self.process_transport_line(timestamp, text, ProcessingMode::Replay) {
                        LineOutcome::Status(_) => summary.status_lines += 1,
                        LineOutcome::SkippedReply | LineOutcome::Reply(_) => summary.skipped_replies += 1,
                        LineOutcome::Rejected(_) => summary.rejected_lines += 1,
                    }
                }
                Origin::Operator if ConsoleCommand::is_admin_line(text) => {
                    match ConsoleCommand::parse(text) {
                        Ok(ConsoleCommand::Admin(command)) => {
                            self.apply_admin(timestamp, &command);
                            summary.admin_commands += 1;
                        }
                        Ok(ConsoleCommand::Request(_)) => summary.skipped_requests += 1,
                        Err(error) => {
                            warn!(%error, line = replayed.line_number, "skipping operator line");
                        }
                    }
                }
                Origin::Operator => summary.skipped_requests += 1,
            }
        }

        self.checker.prime(&self.table);
        info!(
            entries = entries.len(),
            nodes = self.table.len(),
            status_lines = summary.status_lines,
            admin_commands = summary.admin_commands,
            "replay complete"
        );
        summary
    }

    /// Handle one queued event.
    pub async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Transport { timestamp, line } => {
                self.process_transport_line(timestamp, &line, ProcessingMode::Live);
            }
            EngineEvent::Admin {
                timestamp,
                command,
                responder,
            } => {
                let outcome = self.apply_admin(timestamp, &command);
                let _ = responder.send(outcome);
            }
            EngineEvent::Request {
                token,
                request,
                responder,
            } => {
                let Ok(wire) = self.correlator.begin(token, request, responder) else {
                    return;
                };
                let sent = match &self.outbound {
                    Some(outbound) => outbound.send(wire).await.is_ok(),
                    None => false,
                };
                if !sent {
                    warn!("transport is closed, request not sent");
                    self.correlator.abort(CorrelatorError::Closed);
                }
            }
            EngineEvent::Expire { token } => {
                self.correlator.expire(token);
            }
            EngineEvent::Snapshot(responder) => {
                let _ = responder.send(self.table.clone());
            }
        }
    }

    /// Process events until every sender is dropped, then return the table.
    pub async fn run(mut self, mut events: mpsc::Receiver<EngineEvent>) -> NodeTable {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        self.correlator.abort(CorrelatorError::Closed);
        debug!("engine stopped");
        self.table
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Sending side of the engine queue.
#[derive(Clone)]
pub struct EngineHandle {
    events: mpsc::Sender<EngineEvent>,
}

impl EngineHandle {
    /// Create the engine queue.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (events, receiver) = mpsc::channel(capacity);
        (EngineHandle { events }, receiver)
    }

    /// Raw sender, for transport reader tasks.
    pub fn sender(&self) -> mpsc::Sender<EngineEvent> {
        self.events.clone()
    }

    /// Correlator handle with the given reply timeout.
    pub fn correlator(&self, timeout: std::time::Duration) -> CorrelatorHandle {
        CorrelatorHandle::new(self.events.clone(), timeout)
    }

    /// Queue a gateway line.
    pub async fn transport_line(&self, timestamp: Timestamp, line: impl Into<String>) -> SessionResult<()> {
        self.events
            .send(EngineEvent::Transport {
                timestamp,
                line: line.into(),
            })
            .await
            .map_err(|_| SessionError::Correlator(CorrelatorError::Closed))
    }

    /// Apply an administrative command and wait for its outcome.
    pub async fn admin(&self, timestamp: Timestamp, command: AdminCommand) -> SessionResult<AdminOutcome> {
        let (responder, outcome) = oneshot::channel();
        self.events
            .send(EngineEvent::Admin {
                timestamp,
                command,
                responder,
            })
            .await
            .map_err(|_| SessionError::Correlator(CorrelatorError::Closed))?;
        outcome
            .await
            .map_err(|_| SessionError::Correlator(CorrelatorError::Closed))
    }

    /// Copy of the current node table.
    pub async fn snapshot(&self) -> SessionResult<NodeTable> {
        let (responder, table) = oneshot::channel();
        self.events
            .send(EngineEvent::Snapshot(responder))
            .await
            .map_err(|_| SessionError::Correlator(CorrelatorError::Closed))?;
        table
            .await
            .map_err(|_| SessionError::Correlator(CorrelatorError::Closed))
    }
}
