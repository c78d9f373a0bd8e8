//! Request orchestration: one upload in, a preview or a download out.
//!
//! [`Processor`] owns the long-lived components (OCR engine, formatter,
//! document writer) and drives each request through its lifecycle:
//!
//! ```text
//! validate ─▶ source text (OCR or supplied markdown) ─▶ format
//!          ─▶ preview JSON
//!          └▶ workspace ─▶ artifact ─▶ Download (owns workspace until drained)
//! ```
//!
//! Nothing touches the filesystem before the formatter has succeeded, so a
//! failed or previewed request leaves no files behind. Once a workspace
//! exists, every failure path drops its last handle, which removes it.

use crate::artifact::{ArtifactGenerator, DocumentWriter, DocxWriter, OutputArtifact};
use crate::config::{NotesConfig, OcrBackend};
use crate::error::{ArtifactError, NotesError};
use crate::pipeline::format::MarkdownFormatter;
use crate::pipeline::llm::{resolve_provider, ProviderGenerator, TextGenerator};
use crate::pipeline::ocr::{OcrEngine, OcrExtractor, TesseractEngine, VisionOcrEngine};
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use crate::request::{ProcessRequest, TextSource};
use crate::state::{RequestState, StateTracker};
use crate::stream::Download;
use crate::workspace::RequestWorkspace;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tracing::{debug, error, info};

/// Formatted markdown returned instead of a file.
///
/// Serialises as `{"markdown": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub markdown: String,
}

/// What a successful request produced.
#[derive(Debug)]
pub enum ProcessOutcome {
    Preview(Preview),
    Download(Download),
}

/// Result of the fallible part of a request, before the download takes
/// ownership of the state tracker.
enum Staged {
    Preview(Preview),
    Artifact {
        artifact: OutputArtifact,
        file: File,
        workspace: RequestWorkspace,
    },
}

/// Runs requests against a fixed set of components.
pub struct Processor {
    config: NotesConfig,
    ocr: OcrExtractor,
    formatter: MarkdownFormatter,
    artifacts: ArtifactGenerator,
}

impl Processor {
    /// Build the production components described by `config`.
    ///
    /// # Errors
    /// [`NotesError::ProviderNotConfigured`] when no LLM provider can be
    /// resolved.
    pub fn from_config(config: NotesConfig) -> Result<Self, NotesError> {
        let (provider, label) = resolve_provider(&config)?;
        info!("Using LLM provider '{}' with OCR backend {:?}", label, config.ocr_backend);

        let engine: Arc<dyn OcrEngine> = match config.ocr_backend {
            OcrBackend::Tesseract => Arc::new(TesseractEngine::from_config(&config)),
            OcrBackend::Vision => Arc::new(VisionOcrEngine::new(
                Arc::clone(&provider),
                config.max_tokens,
            )),
        };
        let generator = Arc::new(ProviderGenerator::new(provider, label, &config));

        Ok(Self::with_components(
            config,
            engine,
            generator,
            Arc::new(DocxWriter),
        ))
    }

    /// Assemble a processor from explicit components.
    pub fn with_components(
        config: NotesConfig,
        ocr: Arc<dyn OcrEngine>,
        generator: Arc<dyn TextGenerator>,
        writer: Arc<dyn DocumentWriter>,
    ) -> Self {
        let system_prompt = config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        Self {
            ocr: OcrExtractor::new(ocr, Duration::from_secs(config.ocr_timeout_secs)),
            formatter: MarkdownFormatter::new(
                generator,
                system_prompt,
                Duration::from_secs(config.api_timeout_secs),
            ),
            artifacts: ArtifactGenerator::new(writer),
            config,
        }
    }

    pub fn config(&self) -> &NotesConfig {
        &self.config
    }

    /// Process one request.
    ///
    /// # Returns
    /// * [`ProcessOutcome::Preview`] when `preview` was requested
    /// * [`ProcessOutcome::Download`] otherwise; the request workspace is
    ///   removed when its body is drained or dropped
    ///
    /// # Errors
    /// Any [`NotesError`]; no temporary files survive a failed request.
    pub async fn process(&self, request: ProcessRequest) -> Result<ProcessOutcome, NotesError> {
        let start = Instant::now();
        let mut tracker = StateTracker::new(self.config.observer.clone());

        match self.run(request, &mut tracker).await {
            Ok(Staged::Preview(preview)) => {
                info!(
                    "Preview ready: {} chars in {}ms",
                    preview.markdown.len(),
                    start.elapsed().as_millis()
                );
                Ok(ProcessOutcome::Preview(preview))
            }
            Ok(Staged::Artifact {
                artifact,
                file,
                workspace,
            }) => {
                tracker.advance(RequestState::Streaming);
                info!(
                    "Artifact {} ready in {}ms",
                    artifact.display_filename,
                    start.elapsed().as_millis()
                );
                Ok(ProcessOutcome::Download(Download::new(
                    artifact,
                    file,
                    workspace,
                    tracker,
                    self.config.chunk_size,
                )))
            }
            Err(e) => {
                error!("Request failed in state '{}': {}", tracker.current(), e);
                tracker.fail();
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request: ProcessRequest,
        tracker: &mut StateTracker,
    ) -> Result<Staged, NotesError> {
        // ── Step 1: Validate ─────────────────────────────────────────────
        let request = request.validate(&self.config)?;
        debug!(
            "Validated request: format={:?}, preview={}, stem='{}'",
            request.format, request.preview, request.stem
        );

        // ── Step 2: Source the text ──────────────────────────────────────
        tracker.advance(RequestState::SourcingText);
        let (text, from_ocr) = match request.source {
            TextSource::Markdown(markdown) => (markdown, false),
            TextSource::Image(bytes) => (self.ocr.extract(bytes).await?.text, true),
        };
        if let Some(obs) = tracker.observer() {
            obs.on_text_sourced(text.chars().count(), from_ocr);
        }

        // ── Step 3: Format ───────────────────────────────────────────────
        tracker.advance(RequestState::Formatting);
        let formatted = self.formatter.format(&text).await?;
        if let Some(obs) = tracker.observer() {
            obs.on_formatted(formatted.markdown.chars().count());
        }

        if request.preview {
            tracker.advance(RequestState::PreviewReturn);
            return Ok(Staged::Preview(Preview {
                markdown: formatted.markdown,
            }));
        }

        // ── Step 4: Generate the artifact ────────────────────────────────
        tracker.advance(RequestState::GeneratingArtifact);
        let workspace = RequestWorkspace::create(
            self.config.temp_root.as_deref(),
            self.config.observer.clone(),
        )?;
        let artifact = self
            .artifacts
            .generate(&formatted.markdown, request.format, &request.stem, &workspace)
            .await?;

        let file = File::open(&artifact.path)
            .await
            .map_err(|_| ArtifactError::Missing {
                path: artifact.path.clone(),
            })?;

        Ok(Staged::Artifact {
            artifact,
            file,
            workspace,
        })
    }
}

/// Process a single request with components built from `config`.
///
/// Builds a fresh [`Processor`] each call; reuse a `Processor` when handling
/// many requests.
///
/// # Example
/// ```rust,no_run
/// use autonotes::{process, NotesConfig, ProcessOutcome, ProcessRequest};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("whiteboard.jpg")?;
/// let request = ProcessRequest::from_image(bytes, "whiteboard.jpg").output_format("md");
/// match process(request, &NotesConfig::default()).await? {
///     ProcessOutcome::Download(download) => {
///         let name = download.filename.clone();
///         download.save_to(std::path::Path::new(&name)).await?;
///     }
///     ProcessOutcome::Preview(preview) => println!("{}", preview.markdown),
/// }
/// # Ok(())
/// # }
/// ```
pub async fn process(
    request: ProcessRequest,
    config: &NotesConfig,
) -> Result<ProcessOutcome, NotesError> {
    Processor::from_config(config.clone())?
        .process(request)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, OcrError};
    use crate::pipeline::encode::NormalizedImage;
    use crate::pipeline::llm::Completion;
    use async_trait::async_trait;

    struct NeverOcr;

    #[async_trait]
    impl OcrEngine for NeverOcr {
        fn name(&self) -> &str {
            "never"
        }
        async fn recognize(&self, _image: &NormalizedImage) -> Result<String, OcrError> {
            panic!("OCR must not run for supplied markdown");
        }
    }

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn generate(&self, _system: &str, text: &str) -> Result<Completion, LlmError> {
            Ok(Completion {
                content: text.to_string(),
                input_tokens: 0,
                output_tokens: 0,
            })
        }
    }

    fn processor() -> Processor {
        Processor::with_components(
            NotesConfig::default(),
            Arc::new(NeverOcr),
            Arc::new(Echo),
            Arc::new(DocxWriter),
        )
    }

    #[tokio::test]
    async fn preview_of_supplied_markdown() {
        let outcome = processor()
            .process(ProcessRequest::from_markdown("# Notes\n\n- a").preview(true))
            .await
            .unwrap();
        match outcome {
            ProcessOutcome::Preview(p) => {
                assert_eq!(p.markdown, "# Notes\n\n- a");
                let json = serde_json::to_value(&p).unwrap();
                assert_eq!(json, serde_json::json!({"markdown": "# Notes\n\n- a"}));
            }
            other => panic!("expected preview, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn custom_system_prompt_is_used() {
        struct PromptCheck;

        #[async_trait]
        impl TextGenerator for PromptCheck {
            fn name(&self) -> &str {
                "prompt-check"
            }
            async fn generate(&self, system: &str, text: &str) -> Result<Completion, LlmError> {
                assert_eq!(system, "be brief");
                Ok(Completion {
                    content: text.to_string(),
                    input_tokens: 0,
                    output_tokens: 0,
                })
            }
        }

        let config = NotesConfig::builder().system_prompt("be brief").build().unwrap();
        let processor = Processor::with_components(
            config,
            Arc::new(NeverOcr),
            Arc::new(PromptCheck),
            Arc::new(DocxWriter),
        );
        let outcome = processor
            .process(ProcessRequest::from_markdown("x").preview(true))
            .await
            .unwrap();
        assert!(matches!(outcome, ProcessOutcome::Preview(_)));
    }
}
