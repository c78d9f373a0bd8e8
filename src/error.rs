//! Error types for the autonotes library.
//!
//! The pipeline has one fatal error type, [`NotesError`], returned from
//! [`crate::process::Processor::process`]. Each stage contributes its own
//! error enum so callers can match on the stage that failed:
//!
//! * [`OcrError`]: the image could not be decoded or the OCR engine failed.
//! * [`LlmError`]: the formatting model timed out, rejected the credentials,
//!   or returned nothing usable.
//! * [`ArtifactError`]: the output file could not be produced.
//!
//! [`CleanupWarning`] is the odd one out: removing a request workspace is
//! best-effort, so a failure there is logged and reported to the observer
//! but never returned to the caller.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the autonotes library.
#[derive(Debug, Error)]
pub enum NotesError {
    // ── Request errors ────────────────────────────────────────────────────
    /// Bad or missing input, unsupported output format, oversized upload.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Input image was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Stage errors ──────────────────────────────────────────────────────
    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("Formatting failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Could not generate the output file: {0}")]
    Artifact(#[from] ArtifactError),

    // ── Setup errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl NotesError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        NotesError::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// The error category as named in the public error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NotesError::InvalidRequest { .. }
            | NotesError::FileNotFound { .. }
            | NotesError::PermissionDenied { .. }
            | NotesError::DownloadFailed { .. }
            | NotesError::DownloadTimeout { .. } => ErrorKind::InvalidRequest,
            NotesError::Ocr(_) => ErrorKind::OcrError,
            NotesError::Llm(_) | NotesError::ProviderNotConfigured { .. } => ErrorKind::LlmError,
            NotesError::Artifact(_) => ErrorKind::ArtifactError,
            NotesError::InvalidConfig(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidRequest => 400,
            _ => 500,
        }
    }

    /// JSON body for the error response.
    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            error: format!("Failed to process document: {self}"),
            kind: self.kind(),
        }
    }
}

/// Coarse error category, serialised into [`ErrorBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidRequest,
    OcrError,
    LlmError,
    ArtifactError,
    Internal,
}

/// Error payload returned to the caller instead of an artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
}

/// Failure while turning an image into text.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// The bytes are not an image format we can decode.
    #[error("could not decode image: {detail}")]
    Decode { detail: String },

    /// The engine binary or service could not be reached at all.
    #[error("OCR engine '{engine}' is not available: {detail}")]
    EngineUnavailable { engine: String, detail: String },

    /// The engine ran but reported a failure.
    #[error("OCR engine '{engine}' failed: {detail}")]
    EngineFailed { engine: String, detail: String },

    /// The engine did not answer within the configured timeout.
    #[error("OCR engine '{engine}' timed out after {secs}s")]
    Timeout { engine: String, secs: u64 },

    /// The engine returned no text for the image.
    #[error("no text was recognised in the image")]
    NoText,
}

/// Failure while asking the model to format text.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// 401/403 or an invalid API key.
    #[error("authentication error from provider '{provider}': {detail}")]
    Auth { provider: String, detail: String },

    #[error("LLM API error from provider '{provider}': {detail}")]
    Backend { provider: String, detail: String },

    /// The model answered with nothing (or only control markers).
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Failure while producing the output file.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("could not create request workspace: {source}")]
    Workspace {
        #[source]
        source: std::io::Error,
    },

    /// The request workspace was already released.
    #[error("request workspace has already been released")]
    WorkspaceReleased,

    /// Artifact names must be a single path component.
    #[error("refusing to write '{name}' outside the request workspace")]
    InvalidFilename { name: String },

    #[error("malformed markdown at line {line}: {reason}")]
    MalformedMarkdown { line: usize, reason: String },

    #[error("markdown has no content to put in a document")]
    EmptyDocument,

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to package document '{path}': {detail}")]
    Package { path: PathBuf, detail: String },

    #[error("output file was not created at '{path}'")]
    Missing { path: PathBuf },

    #[error("output file '{path}' was created but is empty")]
    EmptyOutput { path: PathBuf },

    #[error("document writer task failed: {0}")]
    Task(String),
}

/// Non-fatal problem while deleting a request workspace.
#[derive(Debug, Clone, Error)]
#[error("could not remove temporary directory '{path}': {detail}")]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_maps_to_400() {
        let e = NotesError::invalid("unsupported output_format 'pdf'");
        assert_eq!(e.kind(), ErrorKind::InvalidRequest);
        assert_eq!(e.status_code(), 400);
        assert!(e.to_string().contains("pdf"));
    }

    #[test]
    fn stage_errors_map_to_500() {
        let e: NotesError = LlmError::Timeout { secs: 60 }.into();
        assert_eq!(e.kind(), ErrorKind::LlmError);
        assert_eq!(e.status_code(), 500);

        let e: NotesError = OcrError::NoText.into();
        assert_eq!(e.kind(), ErrorKind::OcrError);

        let e: NotesError = ArtifactError::EmptyDocument.into();
        assert_eq!(e.kind(), ErrorKind::ArtifactError);
    }

    #[test]
    fn config_errors_are_internal() {
        let e = NotesError::InvalidConfig("chunk_size must be > 0".into());
        assert_eq!(e.kind(), ErrorKind::Internal);
        assert_eq!(e.status_code(), 500);
    }

    #[test]
    fn error_body_is_prefixed() {
        let e: NotesError = OcrError::Decode {
            detail: "bad magic".into(),
        }
        .into();
        let body = e.to_error_body();
        assert!(body.error.starts_with("Failed to process document: "));
        assert!(body.error.contains("bad magic"));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["kind"], "OcrError");
    }

    #[test]
    fn auth_error_display() {
        let e = LlmError::Auth {
            provider: "anthropic".into(),
            detail: "invalid key".into(),
        };
        assert!(e.to_string().contains("anthropic"));
        assert!(e.to_string().contains("invalid key"));
    }

    #[test]
    fn download_timeout_display() {
        let e = NotesError::DownloadTimeout {
            url: "https://example.org/a.png".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
        assert_eq!(e.kind(), ErrorKind::InvalidRequest);
    }
}
