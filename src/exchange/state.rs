//! Exchange state machine.
//!
//! # States
//! ```text
//! Idle → Uploading → Head → Downloading → End
//!   └───────┴─────────┴──────────┴──────→ Failed
//! ```
//!
//! # Phases
//! - Upload: from creation until a response head arrives
//! - Download: from the first response head on
//!
//! # Design Decisions
//! - A callback outside its allowed state/phase is a transport contract
//!   violation and panics
//! - The first terminal callback wins; later terminal callbacks are absorbed
//! - The machine only decides; `ExchangeHandle` applies the decisions to
//!   the value streams

use std::fmt;

use crate::exchange::ExchangeId;

/// Where the exchange is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Uploading,
    Head,
    Downloading,
    End,
    Failed,
}

impl ExchangeState {
    /// Whether no further callbacks are accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::End | Self::Failed)
    }
}

/// Direction of the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Upload,
    Download,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Upload => write!(f, "upload"),
            Phase::Download => write!(f, "download"),
        }
    }
}

/// Stream that carries a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureTarget {
    Upload,
    Head,
    Body,
}

impl FailureTarget {
    /// Stream name used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureTarget::Upload => "upload",
            FailureTarget::Head => "head",
            FailureTarget::Body => "body",
        }
    }
}

/// Outcome of a terminal callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal<T> {
    Apply(T),
    /// A terminal state was already reached.
    Absorb,
}

/// Cleanup owed when the transport releases an unfinished exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abandon {
    /// Already terminal.
    Nothing,
    /// No head yet: the exchange produced no result.
    BeforeHead,
    /// The body was cut short.
    DuringBody,
}

/// Validates transport callback order for one exchange.
#[derive(Debug)]
pub struct StateMachine {
    id: ExchangeId,
    state: ExchangeState,
    phase: Phase,
    upload_closed: bool,
}

impl StateMachine {
    /// New machine in `Idle`, upload phase.
    pub fn new(id: ExchangeId) -> Self {
        Self {
            id,
            state: ExchangeState::Idle,
            phase: Phase::Upload,
            upload_closed: false,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Current direction.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Validate an upload chunk callback.
    pub fn upload_chunk_sent(&mut self) {
        self.require(self.uploading(), "upload_chunk_sent");
        self.transition(ExchangeState::Uploading);
    }

    /// Validate the end of the request body.
    pub fn upload_finished(&mut self) {
        self.require(self.uploading(), "upload_finished");
        self.upload_closed = true;
    }

    /// Validate a head callback and switch to the download phase.
    pub fn response_head_received(&mut self) {
        let repeated_head = self.state == ExchangeState::Head && self.phase == Phase::Download;
        self.require(self.uploading() || repeated_head, "response_head_received");
        self.upload_closed = true;
        self.phase = Phase::Download;
        self.transition(ExchangeState::Head);
    }

    /// Validate a body chunk callback.
    pub fn body_chunk_received(&mut self) {
        self.require(
            matches!(self.state, ExchangeState::Head | ExchangeState::Downloading)
                && self.phase == Phase::Download,
            "body_chunk_received",
        );
        self.transition(ExchangeState::Downloading);
    }

    /// Validate completion. `Absorb` if already terminal.
    pub fn exchange_finished(&mut self) -> Terminal<()> {
        if self.state == ExchangeState::Failed {
            tracing::warn!(exchange_id = %self.id, "Completion after failure absorbed");
            return Terminal::Absorb;
        }
        self.require(
            matches!(
                self.state,
                ExchangeState::Head | ExchangeState::Downloading | ExchangeState::End
            ) && self.phase == Phase::Download,
            "exchange_finished",
        );
        if self.state == ExchangeState::End {
            return Terminal::Absorb;
        }
        self.transition(ExchangeState::End);
        Terminal::Apply(())
    }

    /// Pick the stream of the active phase and move to `Failed`.
    pub fn transport_error(&mut self) -> Terminal<FailureTarget> {
        let target = match self.state {
            ExchangeState::End | ExchangeState::Failed => {
                tracing::warn!(
                    exchange_id = %self.id,
                    state = ?self.state,
                    "Transport error after terminal state absorbed"
                );
                return Terminal::Absorb;
            }
            ExchangeState::Idle | ExchangeState::Uploading if !self.upload_closed => FailureTarget::Upload,
            ExchangeState::Idle | ExchangeState::Uploading => FailureTarget::Head,
            ExchangeState::Head | ExchangeState::Downloading => FailureTarget::Body,
        };
        self.transition(ExchangeState::Failed);
        Terminal::Apply(target)
    }

    /// The transport dropped the exchange.
    pub fn abandon(&mut self) -> Abandon {
        let abandon = match self.state {
            ExchangeState::End | ExchangeState::Failed => return Abandon::Nothing,
            ExchangeState::Idle | ExchangeState::Uploading => Abandon::BeforeHead,
            ExchangeState::Head | ExchangeState::Downloading => Abandon::DuringBody,
        };
        tracing::warn!(exchange_id = %self.id, state = ?self.state, "Exchange released before completion");
        self.state = match abandon {
            Abandon::DuringBody => ExchangeState::Failed,
            _ => ExchangeState::End,
        };
        abandon
    }

    fn uploading(&self) -> bool {
        matches!(self.state, ExchangeState::Idle | ExchangeState::Uploading) && self.phase == Phase::Upload
    }

    fn transition(&mut self, next: ExchangeState) {
        if self.state != next {
            tracing::debug!(
                exchange_id = %self.id,
                from = ?self.state,
                to = ?next,
                phase = %self.phase,
                "Exchange transition"
            );
        }
        self.state = next;
    }

    fn require(&self, allowed: bool, callback: &str) {
        assert!(
            allowed,
            "transport contract violation: {callback} in state {:?} during {} phase ({})",
            self.state, self.phase, self.id
        );
    }
}
