//! Test fixtures
//!
//! [`TestEnvironment`] wires a [`DownloadService`] to a scripted extractor
//! inside a temporary directory:
//! - `downloads/` for server-side storage
//! - `tmp/` for streaming scratch directories
//! - `cookies.txt`, present only when requested

#![allow(dead_code)]

use crate::mocks::MockExtractor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vidfront::download::service::{DownloadService, ServicePaths};
use vidfront::download::status::{OperationStatus, StatusState, StatusTracker};

/// Error strings as yt-dlp prints them
pub mod messages {
    pub const BOT: &str = "ERROR: [youtube] abc: Sign in to confirm you're not a bot. Use --cookies-from-browser";
    pub const UNAVAILABLE: &str = "ERROR: [youtube] abc: Video unavailable. This video is not available";
    pub const FORMAT: &str = "ERROR: [youtube] abc: Requested format is not available. Use --list-formats";
    pub const MERGE: &str =
        "ERROR: You have requested merging of multiple formats but ffmpeg is not installed. Aborting due to --abort-on-error";
    /// yt-dlp warns about storyboards, then fails on the selector
    pub const PREVIEW: &str = "WARNING: [youtube] abc: Only images are available for download. use --list-formats to see them\nERROR: [youtube] abc: Requested format is not available. Use --list-formats for a list of available formats";
    pub const PRIVATE: &str = "ERROR: [youtube] abc: Private video";
}

pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=abc123&t=5";

/// Complete test environment
///
/// # Example
/// ```ignore
/// let env = TestEnvironment::new(MockExtractor::always(Step::info("t", 3)), false);
/// let info = env.service.info(VIDEO_URL).await?;
/// assert_eq!(env.extractor.call_count(), 1);
/// ```
pub struct TestEnvironment {
    pub root: TempDir,
    pub extractor: Arc<MockExtractor>,
    pub service: Arc<DownloadService>,
}

impl TestEnvironment {
    pub fn new(extractor: MockExtractor, with_cookies: bool) -> Self {
        let root = tempfile::tempdir().unwrap();
        let paths = ServicePaths {
            download_dir: root.path().join("downloads"),
            temp_dir: root.path().join("tmp"),
            cookies_file: root.path().join("cookies.txt"),
        };
        std::fs::create_dir_all(&paths.temp_dir).unwrap();
        if with_cookies {
            std::fs::write(&paths.cookies_file, "# Netscape HTTP Cookie File\n").unwrap();
        }

        let extractor = Arc::new(extractor);
        let tracker = Arc::new(StatusTracker::from_env());
        let service = Arc::new(DownloadService::new(extractor.clone(), tracker, paths));
        Self {
            root,
            extractor,
            service,
        }
    }

    pub fn download_dir(&self) -> PathBuf {
        self.service.paths().download_dir.clone()
    }

    pub fn cookies_file(&self) -> PathBuf {
        self.service.paths().cookies_file.clone()
    }

    /// Number of entries left in the scratch parent directory
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(&self.service.paths().temp_dir).unwrap().count()
    }

    /// Polls until the operation leaves the downloading state.
    pub async fn wait_for_status(&self, key: &str) -> OperationStatus {
        for _ in 0..200 {
            if let Some(status) = self.service.status(key) {
                if status.status != StatusState::Downloading {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("operation {} did not finish in time", key);
    }
}
