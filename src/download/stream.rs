//! Chunked delivery of a temporary artifact with guaranteed cleanup.
//!
//! [`ArtifactStream`] yields the file in chunks of at most
//! [`config::stream::CHUNK_SIZE`] bytes. It owns a [`ScratchGuard`] that
//! deletes the file and its scratch directory exactly once: after the last
//! chunk, after a read error, or when the stream is dropped early because the
//! client went away.

use crate::core::config;
use bytes::Bytes;
use futures_util::Stream;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

type CleanupHook = Box<dyn FnOnce() + Send + Sync>;

#[derive(Debug)]
struct Targets {
    file: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
}

/// Deletes a temporary artifact and its scratch directory, once.
///
/// A guard can be taken on the scratch directory alone before anything is
/// downloaded into it, so a request dropped mid-extraction still cleans up.
pub struct ScratchGuard {
    targets: Option<Targets>,
    hook: Option<CleanupHook>,
}

impl ScratchGuard {
    pub fn new(file: impl Into<PathBuf>, scratch_dir: Option<PathBuf>) -> Self {
        Self {
            targets: Some(Targets {
                file: Some(file.into()),
                scratch_dir,
            }),
            hook: None,
        }
    }

    /// Guards a scratch directory whose artifact is not known yet.
    pub fn for_dir(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            targets: Some(Targets {
                file: None,
                scratch_dir: Some(scratch_dir.into()),
            }),
            hook: None,
        }
    }

    /// Adds the artifact to remove. No effect once cleaned up.
    #[must_use]
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        if let Some(targets) = self.targets.as_mut() {
            targets.file = Some(file.into());
        }
        self
    }

    /// Runs `hook` right after the cleanup.
    #[must_use]
    pub fn on_cleanup<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn is_done(&self) -> bool {
        self.targets.is_none()
    }

    /// Removes the file, then the scratch directory. Later calls do nothing.
    /// Errors are logged, never returned.
    pub fn cleanup(&mut self) {
        let Some(Targets { file, scratch_dir }) = self.targets.take() else {
            return;
        };

        if let Some(file) = &file {
            if let Err(e) = std::fs::remove_file(file) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("Failed to remove streamed file {}: {}", file.display(), e);
                }
            }
        }
        if let Some(dir) = &scratch_dir {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("Failed to remove scratch dir {}: {}", dir.display(), e);
                }
            }
        }
        if let Some(target) = file.as_ref().or(scratch_dir.as_ref()) {
            log::debug!("Cleaned up scratch artifact {}", target.display());
        }

        if let Some(hook) = self.hook.take() {
            hook();
        }
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Content type derived from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "opus" => "audio/opus",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Single-use chunk stream over a temporary artifact.
pub struct ArtifactStream<R = File> {
    inner: ReaderStream<R>,
    guard: ScratchGuard,
    file_name: String,
    content_length: u64,
    content_type: &'static str,
}

impl ArtifactStream<File> {
    /// Opens `path` for streaming under an existing guard. A failed open
    /// drops the guard, which cleans up.
    pub async fn open_guarded(path: &Path, guard: ScratchGuard) -> io::Result<Self> {
        let file = File::open(path).await?;
        let content_length = file.metadata().await?.len();
        Ok(Self::from_reader(file, path, content_length, guard))
    }
}

impl<R: AsyncRead> ArtifactStream<R> {
    pub fn from_reader(reader: R, path: &Path, content_length: u64, guard: ScratchGuard) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download.bin".to_string());
        Self {
            inner: ReaderStream::with_capacity(reader, config::stream::CHUNK_SIZE),
            guard,
            content_type: content_type_for(path),
            file_name,
            content_length,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }
}

impl<R: AsyncRead + Unpin> Stream for ArtifactStream<R> {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.guard.is_done() {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(None) => {
                this.guard.cleanup();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                log::error!("Failed to read {} while streaming: {}", this.file_name, e);
                this.guard.cleanup();
                Poll::Ready(Some(Err(e)))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::ReadBuf;

    fn scratch_with_file(size: usize) -> (tempfile::TempDir, PathBuf, PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("job");
        std::fs::create_dir(&scratch).unwrap();
        let file = scratch.join("clip.mp4");
        std::fs::write(&file, vec![7u8; size]).unwrap();
        (root, scratch, file)
    }

    fn counting_guard(file: &Path, scratch: &Path) -> (ScratchGuard, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&count);
        let guard = ScratchGuard::new(file, Some(scratch.to_path_buf())).on_cleanup(move || {
            hook_count.fetch_add(1, Ordering::SeqCst);
        });
        (guard, count)
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("a.WEBM")), "video/webm");
        assert_eq!(content_type_for(Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(content_type_for(Path::new("a.flac")), "audio/flac");
        assert_eq!(content_type_for(Path::new("a.bin")), "application/octet-stream");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_full_consumption_yields_chunks_and_cleans_up_once() {
        let (_root, scratch, file) = scratch_with_file(20_000);
        let (guard, count) = counting_guard(&file, &scratch);
        let mut stream = ArtifactStream::open_guarded(&file, guard).await.unwrap();
        assert_eq!(stream.content_length(), 20_000);
        assert_eq!(stream.content_type(), "video/mp4");
        assert_eq!(stream.file_name(), "clip.mp4");

        let mut sizes = Vec::new();
        while let Some(chunk) = stream.next().await {
            sizes.push(chunk.unwrap().len());
        }
        assert!(sizes.iter().all(|size| *size <= config::stream::CHUNK_SIZE));
        assert_eq!(sizes.iter().sum::<usize>(), 20_000);
        assert!(!scratch.exists());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(stream.next().await.is_none());
        drop(stream);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_after_partial_read_cleans_up() {
        let (_root, scratch, file) = scratch_with_file(50_000);
        let (guard, count) = counting_guard(&file, &scratch);
        let mut stream = ArtifactStream::open_guarded(&file, guard).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert!(!first.is_empty());
        assert!(scratch.exists());

        drop(stream);
        assert!(!file.exists());
        assert!(!scratch.exists());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    struct FailingReader {
        served: bool,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            if self.served {
                Poll::Ready(Err(io::Error::other("disk went away")))
            } else {
                self.served = true;
                buf.put_slice(b"partial");
                Poll::Ready(Ok(()))
            }
        }
    }

    #[tokio::test]
    async fn test_read_error_cleans_up() {
        let (_root, scratch, file) = scratch_with_file(10);
        let (guard, count) = counting_guard(&file, &scratch);
        let mut stream = ArtifactStream::from_reader(FailingReader { served: false }, &file, 10, guard);

        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from_static(b"partial"));
        assert!(stream.next().await.unwrap().is_err());
        assert!(!scratch.exists());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(stream.next().await.is_none());
        drop(stream);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_open_still_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("job");
        std::fs::create_dir(&scratch).unwrap();
        let missing = scratch.join("missing.mp4");
        let result = ArtifactStream::open_guarded(&missing, ScratchGuard::for_dir(&scratch).with_file(&missing)).await;
        assert!(result.is_err());
        assert!(!scratch.exists());
    }

    #[test]
    fn test_dir_only_guard_removes_partial_files_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("job");
        std::fs::create_dir(&scratch).unwrap();
        std::fs::write(scratch.join("clip.mp4.part"), b"half").unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&count);
        let guard = ScratchGuard::for_dir(&scratch).on_cleanup(move || {
            hook_count.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!guard.is_done());
        drop(guard);

        assert!(!scratch.exists());
        assert!(root.path().exists());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_with_file_after_cleanup_is_ignored() {
        let root = tempfile::tempdir().unwrap();
        let mut guard = ScratchGuard::for_dir(root.path().join("gone"));
        guard.cleanup();
        let guard = guard.with_file(root.path().join("late.mp4"));
        assert!(guard.is_done());
    }

    #[test]
    fn test_guard_without_scratch_dir() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("a.mp3");
        std::fs::write(&file, b"x").unwrap();
        let mut guard = ScratchGuard::new(&file, None);
        guard.cleanup();
        assert!(guard.is_done());
        assert!(!file.exists());
        assert!(root.path().exists());
    }
}
