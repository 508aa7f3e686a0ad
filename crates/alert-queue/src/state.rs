//! Queue state and the reducer that drives it.
//!
//! `QueueState` holds the pending FIFO, the set of identities ever
//! admitted, and the display phase. It performs no I/O and reads no
//! clock: every transition is a [`QueueEvent`] folded in by the single
//! owner, and anything that needs the outside world comes back as an
//! [`Effect`].
//!
//! ```text
//!   Admit (non-empty)        timer (D)           immediate          timer (S)
//!  Idle ───────────► Displaying ───────► Acknowledging ───────► Settling ───► Idle
//!   ▲                                                                         │
//!   └─────────────────────── next head, if any ──────────────────────────────┘
//! ```

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use serde::Serialize;

use crate::alert::{Alert, AlertId};
use crate::duration::SETTLE_DELAY;

/// Display phase of the single active slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Displaying,
    Acknowledging,
    Settling,
}

/// Inputs to the reducer.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Admit(Alert),
    PhaseTimerFired,
    AckCompleted { id: AlertId, ok: bool },
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Replace the phase timer with one firing after the given delay.
    ArmTimer(Duration),
    /// Mark the alert shown upstream.
    Acknowledge(AlertId),
}

#[derive(Debug, Default)]
pub struct QueueState {
    pending: VecDeque<Alert>,
    seen_ids: HashSet<AlertId>,
    phase: Phase,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an alert unless its identity was ever admitted before.
    ///
    /// Returns `false` without touching the state for duplicates.
    fn try_admit(&mut self, alert: Alert) -> bool {
        if !self.seen_ids.insert(alert.id.clone()) {
            return false;
        }
        self.pending.push_back(alert);
        true
    }

    /// Fold one event into the state. `display` is the duration used if
    /// this step starts a new Displaying phase.
    pub fn apply(&mut self, event: QueueEvent, display: Duration) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            QueueEvent::Admit(alert) => {
                if self.try_admit(alert) {
                    effects.extend(self.advance(display));
                }
            }
            QueueEvent::PhaseTimerFired => match self.phase {
                Phase::Displaying => {
                    // Acknowledging is instantaneous: the ack is fired and the
                    // settle timer armed in the same step.
                    self.phase = Phase::Acknowledging;
                    if let Some(active) = self.pending.front() {
                        effects.push(Effect::Acknowledge(active.id.clone()));
                    }
                    self.phase = Phase::Settling;
                    effects.push(Effect::ArmTimer(SETTLE_DELAY));
                }
                Phase::Settling => {
                    self.pending.pop_front();
                    self.phase = Phase::Idle;
                    effects.extend(self.advance(display));
                }
                Phase::Idle | Phase::Acknowledging => {
                    tracing::trace!(phase = ?self.phase, "Ignoring stale phase timer");
                }
            },
            QueueEvent::AckCompleted { .. } => {}
        }
        effects
    }

    /// Start displaying the head if the slot is free.
    fn advance(&mut self, display: Duration) -> Option<Effect> {
        if self.phase != Phase::Idle || self.pending.is_empty() {
            return None;
        }
        self.phase = Phase::Displaying;
        Some(Effect::ArmTimer(display))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The alert occupying the display slot, if any.
    pub fn active(&self) -> Option<&Alert> {
        match self.phase {
            Phase::Idle => None,
            _ => self.pending.front(),
        }
    }

    pub fn is_settling(&self) -> bool {
        self.phase == Phase::Settling
    }

    /// Identities still queued, head first. Includes the active alert.
    pub fn pending_ids(&self) -> Vec<AlertId> {
        self.pending.iter().map(|a| a.id.clone()).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn seen_count(&self) -> usize {
        self.seen_ids.len()
    }

    pub fn has_seen(&self, id: &AlertId) -> bool {
        self.seen_ids.contains(id)
    }
}
