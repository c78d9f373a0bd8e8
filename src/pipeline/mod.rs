//! Pipeline stages for image-to-notes processing.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and engines can be swapped (tesseract vs. a vision
//! model) without touching the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ ocr ──▶ format (llm + postprocess + sanitize)
//! (path/URL) (RGB PNG) (text)  (markdown)
//! ```
//!
//! 1. [`input`]: turn a CLI path or URL into upload bytes
//! 2. [`encode`]: decode the upload and re-encode it as RGB PNG
//! 3. [`ocr`]: recognise text with tesseract or a vision model
//! 4. [`llm`]: the text-generation seam over edgequake-llm
//! 5. [`postprocess`]: deterministic cleanup of model quirks
//! 6. [`format`]: one bounded model call, cleanup, then think-marker removal

pub mod encode;
pub mod format;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod postprocess;
