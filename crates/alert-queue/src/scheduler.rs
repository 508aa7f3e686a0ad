//! Display scheduler: one worker task owns the queue state.
//!
//! Admissions from the bulk fetch, the live feed and direct callers all
//! arrive as commands on a single channel, so every mutation happens on
//! one task. The worker keeps at most one phase timer armed.

#[cfg(test)]
mod tests;

use std::future::pending;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};

use crate::QueueError;
use crate::ack;
use crate::alert::{Alert, AlertId};
use crate::binding::SourceBinding;
use crate::duration::{DEFAULT_DISPLAY_DURATION, display_duration};
use crate::source::AlertSource;
use crate::state::{Effect, Phase, QueueEvent, QueueState};

const COMMAND_CAPACITY: usize = 256;

pub(crate) enum Command {
    Admit {
        alert: Alert,
        reply: Option<oneshot::Sender<bool>>,
    },
    Configure {
        overlay_id: String,
        duration_seconds: Option<String>,
    },
    AckCompleted {
        id: AlertId,
        ok: bool,
    },
    Inspect(oneshot::Sender<QueueSnapshot>),
    Dispose,
    Shutdown(oneshot::Sender<()>),
}

/// Point-in-time view of the queue for the rendering surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub overlay_id: Option<String>,
    pub phase: Phase,
    pub active: Option<Alert>,
    pub is_settling: bool,
    /// Queued identities, head first. The head is the active alert
    /// whenever `phase` is not idle.
    pub queued: Vec<AlertId>,
    pub seen: usize,
    pub acknowledged: u64,
    pub ack_failures: u64,
    pub display_duration_ms: u64,
}

/// Cloneable handle to the queue worker.
///
/// The worker stops once every handle is dropped, after letting the
/// in-flight alert finish its display and settle phases.
#[derive(Clone)]
pub struct AlertQueue {
    tx: mpsc::Sender<Command>,
    snapshot: watch::Receiver<QueueSnapshot>,
}

impl AlertQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn<S: AlertSource>(source: S) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshot_tx, snapshot) = watch::channel(QueueSnapshot {
            display_duration_ms: DEFAULT_DISPLAY_DURATION.as_millis() as u64,
            ..Default::default()
        });

        let worker = Worker {
            source: Arc::new(source),
            state: QueueState::new(),
            display: DEFAULT_DISPLAY_DURATION,
            deadline: None,
            binding: None,
            commands: tx.downgrade(),
            snapshot_tx,
            acknowledged: 0,
            ack_failures: 0,
        };
        tokio::spawn(worker.run(rx));
        tracing::info!("Alert queue worker started");

        Self { tx, snapshot }
    }

    /// Admit an alert directly. Returns `false` for an identity that was
    /// already admitted at some point.
    pub async fn admit(&self, alert: Alert) -> Result<bool, QueueError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Admit {
            alert,
            reply: Some(reply_tx),
        })
        .await?;
        reply_rx.await.map_err(|_| QueueError::Closed)
    }

    /// (Re)bind to an overlay identity and set the display duration used
    /// from the next alert on. An empty identity unbinds the source.
    pub async fn configure(
        &self,
        overlay_id: impl Into<String>,
        duration_seconds: Option<String>,
    ) -> Result<(), QueueError> {
        self.send(Command::Configure {
            overlay_id: overlay_id.into(),
            duration_seconds,
        })
        .await
    }

    /// Tear down the live subscription. In-flight timers still run out.
    pub async fn dispose(&self) -> Result<(), QueueError> {
        self.send(Command::Dispose).await
    }

    pub fn active_alert(&self) -> Option<Alert> {
        self.snapshot.borrow().active.clone()
    }

    pub fn is_settling(&self) -> bool {
        self.snapshot.borrow().is_settling
    }

    /// Stop the worker for every handle: release the subscription, run out
    /// the in-flight display and settle phases, then exit. Resolves once
    /// the worker is done; later calls on any handle return
    /// [`QueueError::Closed`].
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Shutdown(reply_tx)).await?;
        reply_rx.await.map_err(|_| QueueError::Closed)
    }

    /// Latest published snapshot, without a round-trip to the worker.
    pub fn snapshot(&self) -> QueueSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified whenever the published snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.snapshot.clone()
    }

    /// Snapshot taken by the worker after every earlier command was applied.
    pub async fn inspect(&self) -> Result<QueueSnapshot, QueueError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Inspect(reply_tx)).await?;
        reply_rx.await.map_err(|_| QueueError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), QueueError> {
        self.tx.send(command).await.map_err(|_| QueueError::Closed)
    }
}

struct Worker<S> {
    source: Arc<S>,
    state: QueueState,
    display: Duration,
    deadline: Option<Instant>,
    binding: Option<SourceBinding>,
    commands: mpsc::WeakSender<Command>,
    snapshot_tx: watch::Sender<QueueSnapshot>,
    acknowledged: u64,
    ack_failures: u64,
}

impl<S: AlertSource> Worker<S> {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        let mut stopped = None;
        loop {
            let deadline = self.deadline;
            tokio::select! {
                biased;
                _ = async move {
                    match deadline {
                        Some(at) => sleep_until(at).await,
                        None => pending::<()>().await,
                    }
                } => {
                    self.deadline = None;
                    self.dispatch(QueueEvent::PhaseTimerFired);
                }
                command = rx.recv() => match command {
                    Some(command) => {
                        if let ControlFlow::Break(reply) = self.handle(command) {
                            stopped = Some(reply);
                            break;
                        }
                    }
                    None => break,
                },
            }
            self.publish();
        }

        rx.close();
        self.finish_in_flight().await;
        tracing::info!("Alert queue worker stopped");
        if let Some(reply) = stopped {
            let _ = reply.send(());
        }
    }

    fn handle(&mut self, command: Command) -> ControlFlow<oneshot::Sender<()>> {
        match command {
            Command::Admit { alert, reply } => {
                let id = alert.id.clone();
                let before = self.state.seen_count();
                self.dispatch(QueueEvent::Admit(alert));
                let admitted = self.state.seen_count() > before;
                if admitted {
                    tracing::debug!(alert_id = %id, pending = self.state.pending_len(), "Alert admitted");
                } else {
                    tracing::debug!(alert_id = %id, "Duplicate alert rejected");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(admitted);
                }
            }
            Command::Configure {
                overlay_id,
                duration_seconds,
            } => self.configure(overlay_id, duration_seconds),
            Command::AckCompleted { id, ok } => {
                if ok {
                    self.acknowledged += 1;
                } else {
                    self.ack_failures += 1;
                }
                self.dispatch(QueueEvent::AckCompleted { id, ok });
            }
            Command::Inspect(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Dispose => {
                self.binding = None;
            }
            Command::Shutdown(reply) => {
                tracing::info!("Alert queue shutdown requested");
                return ControlFlow::Break(reply);
            }
        }
        ControlFlow::Continue(())
    }

    fn configure(&mut self, overlay_id: String, duration_seconds: Option<String>) {
        self.display = display_duration(duration_seconds.as_deref());
        tracing::info!(
            display_ms = self.display.as_millis() as u64,
            "Alert display duration configured"
        );

        let overlay_id = overlay_id.trim().to_string();
        let unchanged = match &self.binding {
            Some(binding) => binding.overlay_id() == overlay_id,
            None => overlay_id.is_empty(),
        };
        if unchanged {
            return;
        }

        // Drop the stale binding before subscribing for the new identity.
        self.binding = None;
        if !overlay_id.is_empty() {
            self.binding = Some(SourceBinding::start(
                self.source.clone(),
                overlay_id,
                self.commands.clone(),
            ));
        }
    }

    fn dispatch(&mut self, event: QueueEvent) {
        for effect in self.state.apply(event, self.display) {
            match effect {
                Effect::ArmTimer(delay) => {
                    self.deadline = Some(Instant::now() + delay);
                    if let Some(active) = self.state.active() {
                        match self.state.phase() {
                            Phase::Displaying => tracing::info!(
                                alert_id = %active.id,
                                display_ms = delay.as_millis() as u64,
                                "Displaying alert"
                            ),
                            phase => tracing::debug!(alert_id = %active.id, ?phase, "Alert phase timer armed"),
                        }
                    }
                }
                Effect::Acknowledge(id) => {
                    ack::notify_shown(self.source.clone(), id, self.commands.clone());
                }
            }
        }
    }

    /// Run out the current display/settle chain once the worker is stopping.
    /// Queued alerts behind the active one are abandoned unacknowledged.
    async fn finish_in_flight(&mut self) {
        self.binding = None;
        while let Some(at) = self.deadline.take() {
            sleep_until(at).await;
            if self.state.is_settling() {
                break;
            }
            self.dispatch(QueueEvent::PhaseTimerFired);
            self.publish();
        }
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            overlay_id: self.binding.as_ref().map(|b| b.overlay_id().to_string()),
            phase: self.state.phase(),
            active: self.state.active().cloned(),
            is_settling: self.state.is_settling(),
            queued: self.state.pending_ids(),
            seen: self.state.seen_count(),
            acknowledged: self.acknowledged,
            ack_failures: self.ack_failures,
            display_duration_ms: self.display.as_millis() as u64,
        }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
