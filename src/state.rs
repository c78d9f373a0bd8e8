//! Request lifecycle states.
//!
//! ```text
//! Received ─▶ SourcingText ─▶ Formatting ─┬─▶ PreviewReturn
//!                                         └─▶ GeneratingArtifact ─▶ Streaming ─▶ CleanedUp
//!
//! any non-terminal state ─▶ Failed
//! ```

use crate::progress::ProcessObserver;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a single request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    SourcingText,
    Formatting,
    PreviewReturn,
    GeneratingArtifact,
    Streaming,
    CleanedUp,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::PreviewReturn | RequestState::CleanedUp | RequestState::Failed
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: RequestState) -> bool {
        use RequestState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Received, SourcingText)
            | (SourcingText, Formatting)
            | (Formatting, PreviewReturn)
            | (Formatting, GeneratingArtifact)
            | (GeneratingArtifact, Streaming)
            | (Streaming, CleanedUp) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestState::Received => "received",
            RequestState::SourcingText => "sourcing text",
            RequestState::Formatting => "formatting",
            RequestState::PreviewReturn => "preview returned",
            RequestState::GeneratingArtifact => "generating artifact",
            RequestState::Streaming => "streaming",
            RequestState::CleanedUp => "cleaned up",
            RequestState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Tracks the current state of one request and reports transitions.
pub(crate) struct StateTracker {
    current: RequestState,
    observer: Option<Arc<dyn ProcessObserver>>,
}

impl StateTracker {
    pub(crate) fn new(observer: Option<Arc<dyn ProcessObserver>>) -> Self {
        if let Some(ref obs) = observer {
            obs.on_state(RequestState::Received);
        }
        Self {
            current: RequestState::Received,
            observer,
        }
    }

    pub(crate) fn current(&self) -> RequestState {
        self.current
    }

    pub(crate) fn observer(&self) -> Option<&Arc<dyn ProcessObserver>> {
        self.observer.as_ref()
    }

    pub(crate) fn advance(&mut self, next: RequestState) {
        if !self.current.can_advance_to(next) {
            warn!("Unexpected state transition: {} → {}", self.current, next);
        }
        debug!("Request state: {} → {}", self.current, next);
        self.current = next;
        if let Some(ref obs) = self.observer {
            obs.on_state(next);
        }
    }

    /// Move to `Failed` unless the request already reached a terminal state.
    pub(crate) fn fail(&mut self) {
        if !self.current.is_terminal() {
            self.advance(RequestState::Failed);
        }
    }
}
