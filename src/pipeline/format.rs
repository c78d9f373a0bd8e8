//! Formatting: raw text → clean Markdown notes.
//!
//! One model call per request, bounded by the configured API timeout. The
//! answer is post-processed (fences, line endings, whitespace) and then run
//! through [`crate::sanitize::sanitize`] as the very last step, so nothing
//! downstream ever sees a reasoning marker.

use crate::error::LlmError;
use crate::pipeline::llm::TextGenerator;
use crate::pipeline::postprocess::clean_markdown;
use crate::sanitize::sanitize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Formatted, sanitised Markdown for one request.
#[derive(Debug, Clone)]
pub struct FormattedMarkdown {
    /// Never empty; contains no think markers.
    pub markdown: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Sends text to a [`TextGenerator`] and cleans up the answer.
pub struct MarkdownFormatter {
    generator: Arc<dyn TextGenerator>,
    system_prompt: String,
    timeout: Duration,
}

impl MarkdownFormatter {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        system_prompt: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            system_prompt: system_prompt.into(),
            timeout,
        }
    }

    /// Format `source` into Markdown notes.
    ///
    /// # Errors
    /// * [`LlmError::Timeout`]: the model did not answer in time
    /// * [`LlmError::EmptyResponse`]: nothing left after sanitising
    /// * whatever the generator reports (auth, backend)
    pub async fn format(&self, source: &str) -> Result<FormattedMarkdown, LlmError> {
        let start = Instant::now();
        debug!(
            "Formatting {} chars with '{}'",
            source.len(),
            self.generator.name()
        );

        let completion = tokio::time::timeout(
            self.timeout,
            self.generator.generate(&self.system_prompt, source),
        )
        .await
        .map_err(|_| LlmError::Timeout {
            secs: self.timeout.as_secs(),
        })??;

        let markdown = sanitize(&clean_markdown(&completion.content));
        if markdown.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        info!(
            "Formatted {} → {} chars in {}ms",
            source.len(),
            markdown.len(),
            start.elapsed().as_millis()
        );

        Ok(FormattedMarkdown {
            markdown,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::Completion;
    use async_trait::async_trait;

    struct Canned {
        reply: String,
        delay: Duration,
    }

    #[async_trait]
    impl TextGenerator for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _system: &str, _text: &str) -> Result<Completion, LlmError> {
            tokio::time::sleep(self.delay).await;
            Ok(Completion {
                content: self.reply.clone(),
                input_tokens: 10,
                output_tokens: 5,
            })
        }
    }

    fn formatter(reply: &str) -> MarkdownFormatter {
        MarkdownFormatter::new(
            Arc::new(Canned {
                reply: reply.to_string(),
                delay: Duration::ZERO,
            }),
            "prompt",
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn strips_reasoning_and_fences() {
        let out = formatter("```markdown\n<think>plan the headings</think>\n# Entropy\n\n- disorder\n```")
            .format("entropy disorder")
            .await
            .unwrap();
        assert_eq!(out.markdown, "# Entropy\n\n- disorder");
        assert_eq!((out.input_tokens, out.output_tokens), (10, 5));
    }

    #[tokio::test]
    async fn unterminated_marker_drops_the_tail() {
        let out = formatter("# Notes\n<think>and then I").format("x").await.unwrap();
        assert_eq!(out.markdown, "# Notes");
    }

    #[tokio::test]
    async fn marker_split_by_invisible_char_is_removed() {
        let out = formatter("# A\n<thi\u{200B}nk>hidden</think>\nbody")
            .format("x")
            .await
            .unwrap();
        assert!(!out.markdown.contains("think"));
        assert!(out.markdown.contains("body"));
    }

    #[tokio::test]
    async fn only_reasoning_is_empty_response() {
        let err = formatter("<think>nothing useful</think>")
            .format("x")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));

        let err = formatter("   ").format("x").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        let formatter = MarkdownFormatter::new(
            Arc::new(Canned {
                reply: "# late".into(),
                delay: Duration::from_secs(10),
            }),
            "prompt",
            Duration::from_millis(50),
        );
        let err = formatter.format("x").await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout { .. }));
    }
}
