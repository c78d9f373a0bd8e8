//! The incoming request and its validation.
//!
//! A request mirrors the upload form: an image file, an `output_format`
//! string, a `preview` flag and an optional `markdown_content` that bypasses
//! OCR. Validation happens synchronously, before any engine is called, and
//! produces a [`ValidatedRequest`] the orchestrator can act on without
//! re-checking anything.

use crate::config::{NotesConfig, OutputFormat};
use crate::error::NotesError;

/// Stem used when the upload has no usable filename.
pub const DEFAULT_STEM: &str = "notes";

/// A single processing request.
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    /// Uploaded image, if any.
    pub image_bytes: Option<Vec<u8>>,
    /// Original upload filename; the artifact name is derived from it.
    pub filename: String,
    /// Raw `output_format` value (`docx`, `md`, `markdown`). None = docx.
    pub output_format: Option<String>,
    /// Return formatted markdown as JSON instead of a file.
    pub preview: bool,
    /// Pre-supplied markdown; when non-blank, OCR is skipped.
    pub markdown_content: Option<String>,
}

impl ProcessRequest {
    /// Request that OCRs an uploaded image.
    pub fn from_image(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            image_bytes: Some(bytes.into()),
            filename: filename.into(),
            ..Default::default()
        }
    }

    /// Request that formats caller-supplied markdown.
    pub fn from_markdown(markdown: impl Into<String>) -> Self {
        Self {
            markdown_content: Some(markdown.into()),
            ..Default::default()
        }
    }

    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    pub fn preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn markdown_content(mut self, markdown: impl Into<String>) -> Self {
        self.markdown_content = Some(markdown.into());
        self
    }

    /// Check every field and decide where the text will come from.
    pub fn validate(self, config: &NotesConfig) -> Result<ValidatedRequest, NotesError> {
        let format = OutputFormat::parse(self.output_format.as_deref())?;
        let stem = derive_stem(&self.filename);

        let source = match self.markdown_content {
            Some(md) if !md.trim().is_empty() => TextSource::Markdown(md),
            _ => match self.image_bytes {
                Some(bytes) if !bytes.is_empty() => {
                    if bytes.len() > config.max_image_bytes {
                        return Err(NotesError::invalid(format!(
                            "image is {} bytes, limit is {}",
                            bytes.len(),
                            config.max_image_bytes
                        )));
                    }
                    TextSource::Image(bytes)
                }
                Some(_) => return Err(NotesError::invalid("uploaded file is empty")),
                None => {
                    return Err(NotesError::invalid(
                        "either an image file or markdown_content is required",
                    ))
                }
            },
        };

        Ok(ValidatedRequest {
            source,
            format,
            preview: self.preview,
            stem,
        })
    }
}

/// Where the text to format comes from.
#[derive(Debug, Clone)]
pub enum TextSource {
    Markdown(String),
    Image(Vec<u8>),
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub source: TextSource,
    pub format: OutputFormat,
    pub preview: bool,
    /// Safe file stem for the artifact.
    pub stem: String,
}

/// Interpret an HTML-form style boolean (`true`, `1`, `yes`, `on`).
pub fn preview_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Reduce an upload filename to a safe artifact stem.
///
/// Drops directories (either separator) and the extension, replaces
/// anything outside `[A-Za-z0-9 _.-]` with `_`, and falls back to
/// [`DEFAULT_STEM`] when nothing usable is left.
pub fn derive_stem(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or("");
    let stem = match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    };

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        DEFAULT_STEM.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> NotesConfig {
        NotesConfig::default()
    }

    #[test]
    fn markdown_takes_precedence() {
        let req = ProcessRequest::from_image(vec![1, 2, 3], "a.png").markdown_content("# Hi");
        let v = req.validate(&cfg()).unwrap();
        assert!(matches!(v.source, TextSource::Markdown(ref s) if s == "# Hi"));
        assert_eq!(v.format, OutputFormat::Docx);
    }

    #[test]
    fn blank_markdown_falls_back_to_image() {
        let req = ProcessRequest::from_image(vec![1, 2, 3], "a.png").markdown_content("  \n");
        let v = req.validate(&cfg()).unwrap();
        assert!(matches!(v.source, TextSource::Image(_)));
    }

    #[test]
    fn missing_both_sources_is_invalid() {
        let err = ProcessRequest::default().validate(&cfg()).unwrap_err();
        assert!(matches!(err, NotesError::InvalidRequest { .. }));

        let err = ProcessRequest::from_image(Vec::new(), "a.png")
            .validate(&cfg())
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn oversized_image_is_invalid() {
        let config = NotesConfig::builder().max_image_bytes(4).build().unwrap();
        let err = ProcessRequest::from_image(vec![0; 5], "a.png")
            .validate(&config)
            .unwrap_err();
        assert!(matches!(err, NotesError::InvalidRequest { .. }));
    }

    #[test]
    fn bad_format_is_invalid_even_with_markdown() {
        let err = ProcessRequest::from_markdown("# x")
            .output_format("pdf")
            .validate(&cfg())
            .unwrap_err();
        assert!(err.to_string().contains("pdf"));
    }

    #[test]
    fn preview_flag_values() {
        assert!(preview_flag("true"));
        assert!(preview_flag(" ON "));
        assert!(preview_flag("1"));
        assert!(!preview_flag("false"));
        assert!(!preview_flag(""));
    }

    #[test]
    fn stem_derivation() {
        assert_eq!(derive_stem("lecture 3.png"), "lecture 3");
        assert_eq!(derive_stem("photos/board.final.jpg"), "board.final");
        assert_eq!(derive_stem("C:\\Users\\me\\scan.jpeg"), "scan");
        assert_eq!(derive_stem("../../etc/passwd"), "passwd");
        assert_eq!(derive_stem(".hidden"), "hidden");
        assert_eq!(derive_stem(""), DEFAULT_STEM);
        assert_eq!(derive_stem("???.png"), DEFAULT_STEM);
        assert_eq!(derive_stem("résumé.png"), "r_sum_");
    }
}
