//! Streaming download of a generated artifact.
//!
//! ## Why stream?
//!
//! A transport should not have to buffer the whole document, and more
//! importantly the request workspace must live exactly as long as the
//! transfer. The [`Download`] body therefore owns the open file, the
//! workspace handle and the request's state tracker:
//!
//! * After the last chunk the file is closed, the observer hears
//!   `on_transfer_complete`, the workspace is released and the request
//!   moves to `CleanedUp`.
//! * A read error releases the workspace, fails the request and is yielded
//!   as the final item.
//! * Dropping the body early (client disconnected) fires
//!   `on_transfer_aborted`, releases the workspace and fails the request.
//!
//! The file stays on disk for as long as a consumer is still reading it.

use crate::artifact::OutputArtifact;
use crate::state::{RequestState, StateTracker};
use crate::workspace::RequestWorkspace;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// A boxed stream of artifact chunks.
pub type ArtifactBody = Pin<Box<dyn Stream<Item = io::Result<Vec<u8>>> + Send>>;

/// A generated file ready to be sent to the client.
pub struct Download {
    /// Name the client should save the file under.
    pub filename: String,
    pub mime_type: &'static str,
    /// Exact size of the body in bytes.
    pub content_length: u64,
    path: PathBuf,
    body: ArtifactBody,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("content_length", &self.content_length)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Download {
    /// Wrap an already-opened artifact. The request must be in `Streaming`.
    pub(crate) fn new(
        artifact: OutputArtifact,
        file: File,
        workspace: RequestWorkspace,
        tracker: StateTracker,
        chunk_size: usize,
    ) -> Self {
        let state = BodyState {
            file: Some(file),
            workspace: Some(workspace),
            tracker,
            chunk_size: chunk_size.max(1),
            sent: 0,
            finished: false,
        };

        let body = stream::unfold(state, |mut state| async move {
            if state.finished {
                return None;
            }
            let file = state.file.as_mut()?;
            let mut buf = vec![0u8; state.chunk_size];
            match file.read(&mut buf).await {
                Ok(0) => {
                    state.complete().await;
                    None
                }
                Ok(n) => {
                    buf.truncate(n);
                    state.sent += n as u64;
                    Some((Ok(buf), state))
                }
                Err(e) => {
                    state.fail_with(&e).await;
                    Some((Err(e), state))
                }
            }
        });

        Self {
            filename: artifact.display_filename,
            mime_type: artifact.mime_type,
            content_length: artifact.size_bytes,
            path: artifact.path,
            body: Box::pin(body),
        }
    }

    /// Where the artifact lives while the download is in progress.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The raw chunk stream, for handing to a transport.
    pub fn into_body(self) -> ArtifactBody {
        self.body
    }

    /// Drain the body into memory.
    pub async fn into_bytes(self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.content_length as usize);
        let mut body = self.body;
        while let Some(chunk) = body.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    /// Stream the body into `dest`; returns bytes written.
    ///
    /// Chunks go to a hidden `.part` file next to `dest`, which is renamed
    /// over `dest` only once the body has ended. On any error the partial
    /// file is removed and an existing `dest` is left untouched.
    pub async fn save_to(self, dest: &Path) -> io::Result<u64> {
        let tmp = partial_path(dest);
        let result = async {
            let written = write_body(self.body, &tmp).await?;
            tokio::fs::rename(&tmp, dest).await?;
            Ok::<_, io::Error>(written)
        }
        .await;

        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&tmp).await {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Could not remove partial file {}: {}", tmp.display(), e);
                }
            }
        }
        result
    }
}

async fn write_body(mut body: ArtifactBody, path: &Path) -> io::Result<u64> {
    let mut file = File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// `dir/notes.docx` → `dir/.notes.docx.part`
fn partial_path(dest: &Path) -> PathBuf {
    match dest.file_name() {
        Some(name) => dest.with_file_name(format!(".{}.part", name.to_string_lossy())),
        None => dest.with_extension("part"),
    }
}

/// Everything the body owns between chunks.
struct BodyState {
    file: Option<File>,
    workspace: Option<RequestWorkspace>,
    tracker: StateTracker,
    chunk_size: usize,
    sent: u64,
    finished: bool,
}

impl BodyState {
    async fn complete(&mut self) {
        self.finished = true;
        // Close before removing the directory that contains it.
        self.file.take();
        info!("Transfer complete: {} bytes", self.sent);
        if let Some(obs) = self.tracker.observer() {
            obs.on_transfer_complete(self.sent);
        }
        self.release_off_runtime().await;
        self.tracker.advance(RequestState::CleanedUp);
    }

    async fn fail_with(&mut self, err: &io::Error) {
        self.finished = true;
        self.file.take();
        warn!("Transfer failed after {} bytes: {}", self.sent, err);
        self.release_off_runtime().await;
        self.tracker.fail();
    }

    /// Directory removal is blocking I/O, so it runs on the blocking pool.
    async fn release_off_runtime(&mut self) {
        if let Some(workspace) = self.workspace.take() {
            let fallback = workspace.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || workspace.release()).await {
                warn!("Workspace removal task failed: {}", e);
                fallback.release();
            }
        }
    }
}

impl Drop for BodyState {
    // Drop may run outside any runtime, so an early abort removes the
    // directory inline. It holds one small file.
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.file.take();
        debug!("Download dropped after {} bytes", self.sent);
        if let Some(obs) = self.tracker.observer() {
            obs.on_transfer_aborted(self.sent);
        }
        if let Some(workspace) = self.workspace.take() {
            workspace.release();
        }
        self.tracker.fail();
    }
}
