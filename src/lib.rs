//! # autonotes
//!
//! Turn photos of lecture boards, slides and handwritten pages into
//! formatted study notes, delivered as Markdown or a Word document.
//!
//! ## Why this crate?
//!
//! Raw OCR output is a wall of text: no headings, broken lines, the odd
//! misread word. This crate OCRs the image, asks an LLM to restructure the
//! text into Markdown notes (fixing obvious OCR errors, adding no
//! commentary), strips any reasoning the model leaked, and packages the
//! result as a file a student can open.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image (or supplied markdown)
//!  │
//!  ├─ 1. Validate  output format, preview flag, size limit
//!  ├─ 2. OCR       tesseract or a vision model (skipped for markdown input)
//!  ├─ 3. Format    one LLM call, cleanup, <think> marker removal
//!  ├─ 4. Preview   {"markdown": …} and stop, or
//!  ├─ 5. Artifact  .md or .docx in a per-request temp directory
//!  └─ 6. Download  chunked body; the directory is removed when it ends
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use autonotes::{NotesConfig, ProcessOutcome, ProcessRequest, Processor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let processor = Processor::from_config(NotesConfig::default())?;
//!     let image = std::fs::read("lecture.jpg")?;
//!     let request = ProcessRequest::from_image(image, "lecture.jpg").preview(true);
//!     if let ProcessOutcome::Preview(preview) = processor.process(request).await? {
//!         println!("{}", preview.markdown);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `autonotes` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! autonotes = { version = "0.1", default-features = false }
//! ```
//!
//! ## OCR Backends
//!
//! | Backend | Needs | Best for |
//! |---------|-------|----------|
//! | `tesseract` | `tesseract` on PATH | Printed slides, offline use |
//! | `vision`    | a vision-capable model | Handwriting, photos at an angle |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod request;
pub mod sanitize;
pub mod state;
pub mod stream;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{ArtifactGenerator, DocumentWriter, DocxWriter, OutputArtifact};
pub use config::{NotesConfig, NotesConfigBuilder, OcrBackend, OutputFormat};
pub use error::{ArtifactError, CleanupWarning, ErrorBody, ErrorKind, LlmError, NotesError, OcrError};
pub use pipeline::llm::{Completion, TextGenerator};
pub use pipeline::ocr::OcrEngine;
pub use process::{process, Preview, ProcessOutcome, Processor};
pub use progress::{NoopObserver, ProcessObserver};
pub use request::ProcessRequest;
pub use sanitize::sanitize;
pub use state::RequestState;
pub use stream::{ArtifactBody, Download};
pub use workspace::{CleanupOutcome, RequestWorkspace};
