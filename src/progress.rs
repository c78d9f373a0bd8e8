//! Observer trait for per-request pipeline events.
//!
//! Inject an [`Arc<dyn ProcessObserver>`] via
//! [`crate::config::NotesConfigBuilder::observer`] to receive events as a
//! request moves through OCR, formatting, artifact generation and download.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a spinner, a metrics counter or a test
//! recorder without the library knowing how the host application
//! communicates. The trait is `Send + Sync` because the download body that
//! fires the transfer and cleanup events may be polled on any worker thread.
//!
//! # Example
//!
//! ```rust
//! use autonotes::{NotesConfig, ProcessObserver, RequestState};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Recorder {
//!     states: Mutex<Vec<RequestState>>,
//! }
//!
//! impl ProcessObserver for Recorder {
//!     fn on_state(&self, state: RequestState) {
//!         self.states.lock().unwrap().push(state);
//!     }
//! }
//!
//! let recorder = Arc::new(Recorder::default());
//! let config = NotesConfig::builder()
//!     .observer(recorder.clone() as Arc<dyn ProcessObserver>)
//!     .build()
//!     .unwrap();
//! ```

use crate::state::RequestState;
use crate::workspace::CleanupOutcome;
use std::sync::Arc;

/// Called by the pipeline as it processes a request.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ProcessObserver: Send + Sync {
    /// Called on every state transition, starting with `Received`.
    fn on_state(&self, state: RequestState) {
        let _ = state;
    }

    /// Called once the text source is known.
    ///
    /// # Arguments
    /// * `chars`: length of the source text
    /// * `from_ocr`: false when the caller supplied markdown directly
    fn on_text_sourced(&self, chars: usize, from_ocr: bool) {
        let _ = (chars, from_ocr);
    }

    /// Called when the formatter produced its (sanitized) markdown.
    fn on_formatted(&self, chars: usize) {
        let _ = chars;
    }

    /// Called after the last byte of the artifact has been handed to the
    /// transport, before the workspace is removed.
    fn on_transfer_complete(&self, bytes_sent: u64) {
        let _ = bytes_sent;
    }

    /// Called when the download body is dropped before it finished, e.g.
    /// because the client disconnected.
    fn on_transfer_aborted(&self, bytes_sent: u64) {
        let _ = bytes_sent;
    }

    /// Called once per request workspace with the result of removing it.
    fn on_cleanup(&self, outcome: &CleanupOutcome) {
        let _ = outcome;
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl ProcessObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::NotesConfig`].
pub type Observer = Arc<dyn ProcessObserver>;
