//! OCR: uploaded image bytes → raw text.
//!
//! [`OcrExtractor`] owns everything that is engine-independent (decoding,
//! RGB normalisation, timeout, empty-result check) and delegates the actual
//! recognition to an [`OcrEngine`]. Two engines ship with the crate:
//!
//! * [`TesseractEngine`]: the local `tesseract` executable, fed through
//!   stdin/stdout so no scratch files are needed.
//! * [`VisionOcrEngine`]: a vision-capable LLM asked to transcribe the
//!   image verbatim.
//!
//! Neither retries. A transient engine failure is surfaced as-is.

use crate::config::NotesConfig;
use crate::error::OcrError;
use crate::pipeline::encode::{normalize_image, to_image_data, NormalizedImage};
use crate::prompts::VISION_OCR_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// A text recogniser.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short engine name used in errors and logs.
    fn name(&self) -> &str;

    /// Recognise the text in an already-normalised image.
    async fn recognize(&self, image: &NormalizedImage) -> Result<String, OcrError>;
}

/// OCR output for one request.
#[derive(Debug, Clone)]
pub struct RawText {
    /// Recognised text, trimmed. Never empty.
    pub text: String,
    /// Name of the engine that produced it.
    pub engine: String,
}

/// Engine-independent OCR front end.
pub struct OcrExtractor {
    engine: Arc<dyn OcrEngine>,
    timeout: Duration,
}

impl OcrExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// Decode `image_bytes` and run the engine on it.
    ///
    /// # Errors
    /// * [`OcrError::Decode`]: not an image we can read
    /// * [`OcrError::Timeout`]: engine exceeded the configured timeout
    /// * [`OcrError::NoText`]: engine ran but found nothing
    /// * whatever the engine itself reports
    pub async fn extract(&self, image_bytes: Vec<u8>) -> Result<RawText, OcrError> {
        let start = Instant::now();
        let image = tokio::task::spawn_blocking(move || normalize_image(&image_bytes))
            .await
            .map_err(|e| OcrError::Decode {
                detail: format!("decode task panicked: {e}"),
            })??;

        let engine = self.engine.name().to_string();
        debug!("Running OCR engine '{}' on {}x{} image", engine, image.width, image.height);

        let text = tokio::time::timeout(self.timeout, self.engine.recognize(&image))
            .await
            .map_err(|_| OcrError::Timeout {
                engine: engine.clone(),
                secs: self.timeout.as_secs(),
            })??;

        let text = text.trim();
        if text.is_empty() {
            return Err(OcrError::NoText);
        }

        info!(
            "OCR ({}) extracted {} chars in {}ms",
            engine,
            text.len(),
            start.elapsed().as_millis()
        );

        Ok(RawText {
            text: text.to_string(),
            engine,
        })
    }
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// Local tesseract executable.
pub struct TesseractEngine {
    cmd: PathBuf,
    language: String,
}

impl TesseractEngine {
    pub fn new(cmd: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            language: language.into(),
        }
    }

    pub fn from_config(config: &NotesConfig) -> Self {
        Self::new(config.tesseract_cmd.clone(), config.ocr_language.clone())
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: &NormalizedImage) -> Result<String, OcrError> {
        let mut child = Command::new(&self.cmd)
            .arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg("3")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OcrError::EngineUnavailable {
                engine: self.name().to_string(),
                detail: format!("failed to run {}: {e}", self.cmd.display()),
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| OcrError::EngineFailed {
            engine: self.name().to_string(),
            detail: "stdin was not captured".into(),
        })?;
        stdin
            .write_all(&image.png)
            .await
            .map_err(|e| OcrError::EngineFailed {
                engine: self.name().to_string(),
                detail: format!("failed to send image: {e}"),
            })?;
        // Closing stdin tells tesseract the image is complete.
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OcrError::EngineFailed {
                engine: self.name().to_string(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::EngineFailed {
                engine: self.name().to_string(),
                detail: format!("exit {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ── Vision LLM ───────────────────────────────────────────────────────────

/// A vision-capable model used as an OCR engine.
pub struct VisionOcrEngine {
    provider: Arc<dyn LLMProvider>,
    max_tokens: usize,
}

impl VisionOcrEngine {
    pub fn new(provider: Arc<dyn LLMProvider>, max_tokens: usize) -> Self {
        Self {
            provider,
            max_tokens,
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcrEngine {
    fn name(&self) -> &str {
        "vision"
    }

    async fn recognize(&self, image: &NormalizedImage) -> Result<String, OcrError> {
        let messages = vec![
            ChatMessage::system(VISION_OCR_PROMPT),
            // The image carries all the content; the text part stays empty.
            ChatMessage::user_with_images("", vec![to_image_data(image)]),
        ];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| OcrError::EngineFailed {
                engine: self.name().to_string(),
                detail: e.to_string(),
            })?;

        debug!(
            "Vision OCR: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubEngine {
        reply: Result<String, OcrError>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl StubEngine {
        fn replying(reply: Result<String, OcrError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }
    }

    #[async_trait]
    impl OcrEngine for StubEngine {
        fn name(&self) -> &str {
            "stub"
        }

        async fn recognize(&self, image: &NormalizedImage) -> Result<String, OcrError> {
            assert_eq!(&image.png[..4], b"\x89PNG");
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([250, 250, 250])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn extract_trims_engine_output() {
        let engine = StubEngine::replying(Ok("  Lecture 4\nEntropy  \n".into()));
        let extractor = OcrExtractor::new(engine.clone(), Duration::from_secs(5));
        let raw = extractor.extract(jpeg_bytes()).await.unwrap();
        assert_eq!(raw.text, "Lecture 4\nEntropy");
        assert_eq!(raw.engine, "stub");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undecodable_image_never_reaches_engine() {
        let engine = StubEngine::replying(Ok("text".into()));
        let extractor = OcrExtractor::new(engine.clone(), Duration::from_secs(5));
        let err = extractor.extract(b"GIF89a-but-not-really".to_vec()).await.unwrap_err();
        assert!(matches!(err, OcrError::Decode { .. }));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_result_is_no_text() {
        let engine = StubEngine::replying(Ok(" \n\t".into()));
        let extractor = OcrExtractor::new(engine, Duration::from_secs(5));
        let err = extractor.extract(jpeg_bytes()).await.unwrap_err();
        assert!(matches!(err, OcrError::NoText));
    }

    #[tokio::test]
    async fn engine_failure_is_surfaced_without_retry() {
        let engine = StubEngine::replying(Err(OcrError::EngineFailed {
            engine: "stub".into(),
            detail: "boom".into(),
        }));
        let extractor = OcrExtractor::new(engine.clone(), Duration::from_secs(5));
        let err = extractor.extract(jpeg_bytes()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_engine_times_out() {
        let engine = Arc::new(StubEngine {
            reply: Ok("late".into()),
            calls: AtomicUsize::new(0),
            delay: Duration::from_secs(10),
        });
        let extractor = OcrExtractor::new(engine, Duration::from_millis(50));
        let err = extractor.extract(jpeg_bytes()).await.unwrap_err();
        assert!(matches!(err, OcrError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_tesseract_binary_is_unavailable() {
        let engine = TesseractEngine::new("/nonexistent/bin/tesseract-for-tests", "eng");
        let image = normalize_image(&jpeg_bytes()).unwrap();
        let err = engine.recognize(&image).await.unwrap_err();
        assert!(matches!(err, OcrError::EngineUnavailable { .. }));
    }
}
