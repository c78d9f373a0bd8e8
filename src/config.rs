//! Configuration types for image-to-notes processing.
//!
//! Everything the pipeline needs from its environment (which model, which
//! OCR engine, where to put temporary files) lives in [`NotesConfig`] and is
//! handed to [`crate::process::Processor`] once at construction. Leaf
//! components never read environment variables themselves.

use crate::error::NotesError;
use crate::progress::ProcessObserver;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the notes pipeline.
///
/// Built via [`NotesConfig::builder()`] or using [`NotesConfig::default()`].
///
/// # Example
/// ```rust
/// use autonotes::{NotesConfig, OcrBackend};
///
/// let config = NotesConfig::builder()
///     .model("gpt-4.1-mini")
///     .ocr_backend(OcrBackend::Tesseract)
///     .ocr_language("eng+deu")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct NotesConfig {
    /// LLM model identifier, e.g. "gpt-4.1-nano", "qwen3:0.6b".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the formatting call. Default: 0.1.
    ///
    /// Formatting should restructure what the OCR saw, not invent content,
    /// so this stays close to deterministic.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate. Default: 4096.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Per-LLM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Which OCR engine reads the image. Default: [`OcrBackend::Tesseract`].
    pub ocr_backend: OcrBackend,

    /// Tesseract language code(s), e.g. "eng" or "eng+fra". Default: "eng".
    pub ocr_language: String,

    /// Path to the tesseract executable. Default: "tesseract" (from PATH).
    pub tesseract_cmd: PathBuf,

    /// OCR timeout in seconds. Default: 120.
    pub ocr_timeout_secs: u64,

    /// Largest accepted upload, in bytes. Default: 20 MiB.
    pub max_image_bytes: usize,

    /// Directory under which per-request workspaces are created.
    /// If None, the system temp directory is used.
    pub temp_root: Option<PathBuf>,

    /// Read size used when streaming an artifact. Default: 64 KiB.
    pub chunk_size: usize,

    /// Download timeout for URL inputs in seconds (CLI). Default: 120.
    pub download_timeout_secs: u64,

    /// Receives state transitions and cleanup events.
    pub observer: Option<Arc<dyn ProcessObserver>>,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            system_prompt: None,
            api_timeout_secs: 60,
            ocr_backend: OcrBackend::default(),
            ocr_language: "eng".to_string(),
            tesseract_cmd: PathBuf::from("tesseract"),
            ocr_timeout_secs: 120,
            max_image_bytes: 20 * 1024 * 1024,
            temp_root: None,
            chunk_size: 64 * 1024,
            download_timeout_secs: 120,
            observer: None,
        }
    }
}

impl fmt::Debug for NotesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotesConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("ocr_backend", &self.ocr_backend)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("temp_root", &self.temp_root)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn ProcessObserver>"))
            .finish()
    }
}

impl NotesConfig {
    /// Create a new builder for `NotesConfig`.
    pub fn builder() -> NotesConfigBuilder {
        NotesConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`NotesConfig`].
#[derive(Debug)]
pub struct NotesConfigBuilder {
    config: NotesConfig,
}

impl NotesConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn ocr_backend(mut self, backend: OcrBackend) -> Self {
        self.config.ocr_backend = backend;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn max_image_bytes(mut self, n: usize) -> Self {
        self.config.max_image_bytes = n;
        self
    }

    pub fn temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_root = Some(dir.into());
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ProcessObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<NotesConfig, NotesError> {
        let c = &self.config;
        if c.api_timeout_secs == 0 {
            return Err(NotesError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.ocr_timeout_secs == 0 {
            return Err(NotesError::InvalidConfig(
                "OCR timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_image_bytes == 0 {
            return Err(NotesError::InvalidConfig(
                "max_image_bytes must be > 0".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(NotesError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which engine turns the uploaded image into raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OcrBackend {
    /// Local `tesseract` executable. (default)
    #[default]
    Tesseract,
    /// A vision-capable LLM reading the image.
    Vision,
}

/// Kind of file produced in download mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Word document. (default)
    #[default]
    Docx,
    /// The formatted markdown as-is.
    Markdown,
}

pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MARKDOWN_MIME_TYPE: &str = "text/markdown";

impl OutputFormat {
    /// Parse the caller-supplied `output_format` field.
    ///
    /// Absent or blank means [`OutputFormat::Docx`].
    pub fn parse(value: Option<&str>) -> Result<Self, NotesError> {
        let raw = value.map(str::trim).unwrap_or("");
        match raw.to_ascii_lowercase().as_str() {
            "" | "docx" => Ok(OutputFormat::Docx),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            _ => Err(NotesError::invalid(format!(
                "unsupported output_format '{raw}' (expected docx, md or markdown)"
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Markdown => "md",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Docx => DOCX_MIME_TYPE,
            OutputFormat::Markdown => MARKDOWN_MIME_TYPE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = NotesConfig::default();
        assert_eq!(c.temperature, 0.1);
        assert_eq!(c.max_tokens, 4096);
        assert_eq!(c.ocr_backend, OcrBackend::Tesseract);
        assert_eq!(c.ocr_language, "eng");
        assert_eq!(c.chunk_size, 64 * 1024);
    }

    #[test]
    fn builder_clamps() {
        let c = NotesConfig::builder()
            .temperature(5.0)
            .chunk_size(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.chunk_size, 1);
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(NotesConfig::builder().api_timeout_secs(0).build().is_err());
        assert!(NotesConfig::builder().ocr_timeout_secs(0).build().is_err());
        assert!(NotesConfig::builder().ocr_language(" ").build().is_err());
    }

    #[test]
    fn output_format_parse() {
        assert_eq!(OutputFormat::parse(None).unwrap(), OutputFormat::Docx);
        assert_eq!(OutputFormat::parse(Some("")).unwrap(), OutputFormat::Docx);
        assert_eq!(OutputFormat::parse(Some("DOCX")).unwrap(), OutputFormat::Docx);
        assert_eq!(OutputFormat::parse(Some("md")).unwrap(), OutputFormat::Markdown);
        assert_eq!(
            OutputFormat::parse(Some(" Markdown ")).unwrap(),
            OutputFormat::Markdown
        );
        let err = OutputFormat::parse(Some("pdf")).unwrap_err();
        assert!(matches!(err, NotesError::InvalidRequest { .. }));
    }

    #[test]
    fn output_format_metadata() {
        assert_eq!(OutputFormat::Docx.extension(), "docx");
        assert_eq!(OutputFormat::Markdown.mime_type(), "text/markdown");
        assert!(OutputFormat::Docx.mime_type().contains("wordprocessingml"));
    }
}
