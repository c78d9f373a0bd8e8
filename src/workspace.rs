//! Request-scoped temporary directories.
//!
//! A [`RequestWorkspace`] is the only place the pipeline writes to disk. It is
//! created just before artifact generation and removed exactly once, by
//! whichever happens first:
//!
//! * an explicit [`RequestWorkspace::release`] (the download body calls this
//!   after the last chunk has been read), or
//! * the last handle being dropped (request failed, request cancelled,
//!   client went away mid-download).
//!
//! Handles are cheap clones of one shared guard. A blocking document writer
//! keeps its own handle, so cancelling the request cannot delete the
//! directory underneath a writer that is still running.

use crate::error::{ArtifactError, CleanupWarning};
use crate::progress::Observer;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempDir;
use tracing::{debug, warn};

const DIR_PREFIX: &str = "autonotes-";

/// What happened when a workspace was released.
#[derive(Debug, Clone)]
pub enum CleanupOutcome {
    /// Directory and contents deleted.
    Removed,
    /// Someone else already deleted the directory; not an error.
    AlreadyGone,
    /// This handle's workspace had been released before.
    AlreadyReleased,
    /// Deletion failed; the directory may be left behind.
    Failed(CleanupWarning),
}

/// Handle to a per-request temporary directory.
#[derive(Clone)]
pub struct RequestWorkspace {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    dir: Mutex<Option<TempDir>>,
    observer: Option<Observer>,
}

impl RequestWorkspace {
    /// Create a fresh, uniquely named directory under `root` (or the system
    /// temp directory).
    pub fn create(root: Option<&Path>, observer: Option<Observer>) -> Result<Self, ArtifactError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(DIR_PREFIX);

        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|source| ArtifactError::Workspace { source })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|source| ArtifactError::Workspace { source })?;

        let path = dir.path().to_path_buf();
        debug!("Created request workspace {}", path.display());

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                dir: Mutex::new(Some(dir)),
                observer,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn is_released(&self) -> bool {
        self.inner
            .dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Resolve `name` inside the workspace.
    ///
    /// `name` must be a single plain file name: separators, `..` and
    /// absolute paths are rejected so nothing is written outside the
    /// directory.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => {}
            _ => {
                return Err(ArtifactError::InvalidFilename {
                    name: name.to_string(),
                })
            }
        }
        if self.is_released() {
            return Err(ArtifactError::WorkspaceReleased);
        }
        Ok(self.inner.path.join(name))
    }

    /// Delete the directory now. Safe to call any number of times, from any
    /// handle.
    pub fn release(&self) -> CleanupOutcome {
        let dir = self
            .inner
            .dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match dir {
            Some(dir) => self.inner.remove(dir),
            None => CleanupOutcome::AlreadyReleased,
        }
    }
}

impl Inner {
    fn remove(&self, dir: TempDir) -> CleanupOutcome {
        let outcome = match dir.close() {
            Ok(()) => {
                debug!("Removed request workspace {}", self.path.display());
                CleanupOutcome::Removed
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Request workspace {} was already gone", self.path.display());
                CleanupOutcome::AlreadyGone
            }
            Err(e) => {
                let warning = CleanupWarning {
                    path: self.path.clone(),
                    detail: e.to_string(),
                };
                warn!("{}", warning);
                CleanupOutcome::Failed(warning)
            }
        };
        if let Some(ref obs) = self.observer {
            obs.on_cleanup(&outcome);
        }
        outcome
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let dir = self
            .dir
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(dir) = dir {
            self.remove(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_release() {
        let root = tempfile::tempdir().unwrap();
        let ws = RequestWorkspace::create(Some(root.path()), None).unwrap();
        let path = ws.path().to_path_buf();
        assert!(path.is_dir());
        assert!(path.starts_with(root.path()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(DIR_PREFIX));

        std::fs::write(ws.file_path("a.md").unwrap(), "x").unwrap();
        assert!(matches!(ws.release(), CleanupOutcome::Removed));
        assert!(!path.exists());
        assert!(matches!(ws.release(), CleanupOutcome::AlreadyReleased));
    }

    #[test]
    fn distinct_directories() {
        let root = tempfile::tempdir().unwrap();
        let a = RequestWorkspace::create(Some(root.path()), None).unwrap();
        let b = RequestWorkspace::create(Some(root.path()), None).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn drop_of_last_handle_removes() {
        let root = tempfile::tempdir().unwrap();
        let ws = RequestWorkspace::create(Some(root.path()), None).unwrap();
        let path = ws.path().to_path_buf();
        let clone = ws.clone();
        drop(ws);
        assert!(path.exists(), "a live clone keeps the directory");
        drop(clone);
        assert!(!path.exists());
    }

    #[test]
    fn already_deleted_directory_is_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        let ws = RequestWorkspace::create(Some(root.path()), None).unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();
        assert!(matches!(ws.release(), CleanupOutcome::AlreadyGone));
    }

    #[test]
    fn release_from_any_clone() {
        let root = tempfile::tempdir().unwrap();
        let ws = RequestWorkspace::create(Some(root.path()), None).unwrap();
        let other = ws.clone();
        assert!(matches!(other.release(), CleanupOutcome::Removed));
        assert!(ws.is_released());
        assert!(matches!(ws.release(), CleanupOutcome::AlreadyReleased));
    }

    #[test]
    fn file_path_rejects_escapes() {
        let root = tempfile::tempdir().unwrap();
        let ws = RequestWorkspace::create(Some(root.path()), None).unwrap();
        for bad in ["../x.md", "/etc/passwd", "a/b.md", "a\\b.md", "..", "", "."] {
            assert!(
                matches!(ws.file_path(bad), Err(ArtifactError::InvalidFilename { .. })),
                "accepted {bad:?}"
            );
        }
        assert!(ws.file_path("notes.docx").is_ok());
    }

    #[test]
    fn file_path_after_release_fails() {
        let root = tempfile::tempdir().unwrap();
        let ws = RequestWorkspace::create(Some(root.path()), None).unwrap();
        ws.release();
        assert!(matches!(
            ws.file_path("notes.md"),
            Err(ArtifactError::WorkspaceReleased)
        ));
    }
}
