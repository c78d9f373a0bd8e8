//! Artifact generation: formatted Markdown → a downloadable file inside the
//! request workspace.
//!
//! Markdown output is the formatted text written verbatim. Docx output is
//! rendered by a [`DocumentWriter`] on a blocking thread; that thread owns a
//! clone of the workspace handle, so the directory outlives the writer even
//! if the request future is dropped while it runs.
//!
//! Every artifact is checked after writing: it must exist and be non-empty
//! before anyone is allowed to stream it.

pub mod docx;
pub mod markdown;

use crate::config::OutputFormat;
use crate::error::ArtifactError;
use crate::workspace::RequestWorkspace;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub use docx::{DocumentWriter, DocxWriter};

/// A generated file, ready to be streamed.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    /// Location inside the request workspace.
    pub path: PathBuf,
    pub mime_type: &'static str,
    /// Name offered to the client, e.g. `lecture 3.docx`.
    pub display_filename: String,
    pub size_bytes: u64,
}

/// Writes artifacts in the requested format.
pub struct ArtifactGenerator {
    docx: Arc<dyn DocumentWriter>,
}

impl Default for ArtifactGenerator {
    fn default() -> Self {
        Self::new(Arc::new(DocxWriter))
    }
}

impl ArtifactGenerator {
    pub fn new(docx: Arc<dyn DocumentWriter>) -> Self {
        Self { docx }
    }

    /// Write `markdown` as `<stem>.<ext>` into `workspace`.
    ///
    /// # Errors
    /// * [`ArtifactError::MalformedMarkdown`] / [`ArtifactError::EmptyDocument`]:
    ///   the docx writer could not interpret the text
    /// * [`ArtifactError::Write`] / [`ArtifactError::Package`]: I/O failure
    /// * [`ArtifactError::Missing`] / [`ArtifactError::EmptyOutput`]: the
    ///   writer reported success but left nothing usable behind
    pub async fn generate(
        &self,
        markdown: &str,
        format: OutputFormat,
        stem: &str,
        workspace: &RequestWorkspace,
    ) -> Result<OutputArtifact, ArtifactError> {
        let start = Instant::now();
        let display_filename = format!("{stem}.{}", format.extension());
        let path = workspace.file_path(&display_filename)?;

        match format {
            OutputFormat::Markdown => {
                tokio::fs::write(&path, markdown)
                    .await
                    .map_err(|source| ArtifactError::Write {
                        path: path.clone(),
                        source,
                    })?;
            }
            OutputFormat::Docx => {
                let writer = Arc::clone(&self.docx);
                let guard = workspace.clone();
                let markdown = markdown.to_string();
                let dest = path.clone();
                debug!("Rendering docx with '{}'", writer.name());
                tokio::task::spawn_blocking(move || {
                    // Keeps the directory alive until the writer returns.
                    let _guard = guard;
                    writer.write_document(&markdown, &dest)
                })
                .await
                .map_err(|e| ArtifactError::Task(e.to_string()))??;
            }
        }

        let size_bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(_) => return Err(ArtifactError::Missing { path }),
        };
        if size_bytes == 0 {
            return Err(ArtifactError::EmptyOutput { path });
        }

        info!(
            "Generated {} ({} bytes) in {}ms",
            display_filename,
            size_bytes,
            start.elapsed().as_millis()
        );

        Ok(OutputArtifact {
            path,
            mime_type: format.mime_type(),
            display_filename,
            size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DOCX_MIME_TYPE, MARKDOWN_MIME_TYPE};
    use std::path::Path;

    struct NoOutput;

    impl DocumentWriter for NoOutput {
        fn name(&self) -> &str {
            "no-output"
        }

        fn write_document(&self, _markdown: &str, _dest: &Path) -> Result<(), ArtifactError> {
            Ok(())
        }
    }

    struct EmptyFile;

    impl DocumentWriter for EmptyFile {
        fn name(&self) -> &str {
            "empty-file"
        }

        fn write_document(&self, _markdown: &str, dest: &Path) -> Result<(), ArtifactError> {
            std::fs::write(dest, b"").map_err(|source| ArtifactError::Write {
                path: dest.to_path_buf(),
                source,
            })
        }
    }

    fn workspace() -> (tempfile::TempDir, RequestWorkspace) {
        let root = tempfile::tempdir().unwrap();
        let ws = RequestWorkspace::create(Some(root.path()), None).unwrap();
        (root, ws)
    }

    #[tokio::test]
    async fn markdown_is_written_verbatim() {
        let (_root, ws) = workspace();
        let md = "# Title\n\n- a\n- b";
        let artifact = ArtifactGenerator::default()
            .generate(md, OutputFormat::Markdown, "lecture", &ws)
            .await
            .unwrap();

        assert_eq!(artifact.display_filename, "lecture.md");
        assert_eq!(artifact.mime_type, MARKDOWN_MIME_TYPE);
        assert_eq!(artifact.size_bytes, md.len() as u64);
        assert_eq!(std::fs::read_to_string(&artifact.path).unwrap(), md);
        assert!(artifact.path.starts_with(ws.path()));
    }

    #[tokio::test]
    async fn docx_has_docx_mime_and_content() {
        let (_root, ws) = workspace();
        let artifact = ArtifactGenerator::default()
            .generate("# Title\n\nBody", OutputFormat::Docx, "notes", &ws)
            .await
            .unwrap();

        assert_eq!(artifact.display_filename, "notes.docx");
        assert_eq!(artifact.mime_type, DOCX_MIME_TYPE);
        assert!(artifact.size_bytes > 0);
        let head = std::fs::read(&artifact.path).unwrap();
        assert_eq!(&head[..2], b"PK");
    }

    #[tokio::test]
    async fn writer_that_writes_nothing_is_missing() {
        let (_root, ws) = workspace();
        let err = ArtifactGenerator::new(Arc::new(NoOutput))
            .generate("# x", OutputFormat::Docx, "notes", &ws)
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Missing { .. }));
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let (_root, ws) = workspace();
        let err = ArtifactGenerator::new(Arc::new(EmptyFile))
            .generate("# x", OutputFormat::Docx, "notes", &ws)
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::EmptyOutput { .. }));
    }

    #[tokio::test]
    async fn released_workspace_is_refused() {
        let (_root, ws) = workspace();
        ws.release();
        let err = ArtifactGenerator::default()
            .generate("# x", OutputFormat::Markdown, "notes", &ws)
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::WorkspaceReleased));
    }
}
