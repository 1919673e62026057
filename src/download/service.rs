//! Request-level operations shared by the HTTP server and the CLI.

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::utils::{is_plain_file_name, video_id_from_url};
use crate::download::config_space::{formats_for, metadata_personas_for, personas_for, MediaKind, Quality};
use crate::download::fallback::RetryController;
use crate::download::source::{Extractor, NoProgress, ProgressSink, VideoInfo};
use crate::download::status::{KeyedProgress, OperationStatus, StatusTracker};
use crate::download::stream::{ArtifactStream, ScratchGuard};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Directories and files the service works with.
#[derive(Debug, Clone)]
pub struct ServicePaths {
    /// Server-side storage for `/download`
    pub download_dir: PathBuf,
    /// Parent of the per-request scratch directories
    pub temp_dir: PathBuf,
    /// Stored credentials; only used when the file exists
    pub cookies_file: PathBuf,
}

impl ServicePaths {
    pub fn from_env() -> Self {
        Self {
            download_dir: config::download_dir(),
            temp_dir: config::temp_dir(),
            cookies_file: config::cookies_path(),
        }
    }
}

/// A file in the downloads folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub path: String,
}

pub struct DownloadService {
    extractor: Arc<dyn Extractor>,
    controller: RetryController,
    tracker: Arc<StatusTracker>,
    paths: ServicePaths,
}

impl DownloadService {
    pub fn new(extractor: Arc<dyn Extractor>, tracker: Arc<StatusTracker>, paths: ServicePaths) -> Self {
        Self {
            extractor,
            controller: RetryController::default(),
            tracker,
            paths,
        }
    }

    #[must_use]
    pub fn with_controller(mut self, controller: RetryController) -> Self {
        self.controller = controller;
        self
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    pub fn paths(&self) -> &ServicePaths {
        &self.paths
    }

    /// Checked on every request, so dropping in a cookies file needs no restart.
    pub fn has_stored_credentials(&self) -> bool {
        self.paths.cookies_file.is_file()
    }

    fn credentials(&self) -> Option<&Path> {
        self.has_stored_credentials().then_some(self.paths.cookies_file.as_path())
    }

    /// Metadata lookup.
    pub async fn info(&self, url: &str) -> AppResult<VideoInfo> {
        let url = require_url(url)?;
        let credentials = self.credentials();
        let personas = metadata_personas_for(credentials.is_some());
        log::info!("📋 Fetching info for {} (cookies: {})", url, credentials.is_some());

        self.controller
            .fetch_info(self.extractor.as_ref(), url, &personas, credentials)
            .await
            .map_err(|failure| AppError::Extraction(failure.summary))
    }

    /// Starts a background download into the downloads folder and returns its status key.
    pub async fn start_download(self: &Arc<Self>, url: &str, kind: MediaKind, quality: Quality) -> AppResult<String> {
        let url = require_url(url)?.to_string();

        let base_key = format!("{}_{}", video_id_from_url(&url), chrono::Utc::now().timestamp());
        let key = self.tracker.create_unique(&base_key);
        log::info!(
            "⬇️ Starting download {} for {} ({}, {})",
            key,
            url,
            kind.as_str(),
            quality.as_str()
        );

        let service = Arc::clone(self);
        let task_key = key.clone();
        tokio::spawn(async move {
            service.run_download(&task_key, &url, kind, quality).await;
        });

        Ok(key)
    }

    async fn run_download(&self, key: &str, url: &str, kind: MediaKind, quality: Quality) {
        let progress = KeyedProgress::new(Arc::clone(&self.tracker), key);
        match self.download_to_storage(url, kind, quality, &progress).await {
            Ok(path) => {
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                log::info!("✅ Download {} finished: {}", key, filename);
                self.tracker.mark_finished(key, &filename);
            }
            Err(e) => {
                log::error!("Download {} failed: {}", key, e);
                self.tracker.mark_error(key, &e.to_string());
            }
        }
    }

    /// Downloads into the downloads folder and waits for the result.
    pub async fn download_to_storage(
        &self,
        url: &str,
        kind: MediaKind,
        quality: Quality,
        progress: &dyn ProgressSink,
    ) -> AppResult<PathBuf> {
        let url = require_url(url)?;
        tokio::fs::create_dir_all(&self.paths.download_dir).await?;

        let credentials = self.credentials();
        let personas = personas_for(credentials.is_some());
        let selectors = formats_for(kind, quality);

        self.controller
            .download(
                self.extractor.as_ref(),
                url,
                &personas,
                &selectors,
                credentials,
                kind,
                &self.paths.download_dir,
                progress,
            )
            .await
            .map_err(|failure| AppError::Extraction(failure.summary))
    }

    /// Downloads into a fresh scratch directory and opens the result for streaming.
    ///
    /// The scratch directory is guarded from the moment it exists. It is gone
    /// when this returns an error or when the future is dropped mid-extraction;
    /// on success the returned stream owns it.
    pub async fn download_for_streaming(
        &self,
        url: &str,
        kind: MediaKind,
        quality: Quality,
    ) -> AppResult<ArtifactStream> {
        let url = require_url(url)?;
        let scratch = self.paths.temp_dir.join(format!("vidfront-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&scratch).await?;
        let guard = ScratchGuard::for_dir(&scratch);

        let credentials = self.credentials();
        let personas = personas_for(credentials.is_some());
        let selectors = formats_for(kind, quality);
        log::info!("📤 Streaming download for {} via {}", url, scratch.display());

        let result = self
            .controller
            .download(
                self.extractor.as_ref(),
                url,
                &personas,
                &selectors,
                credentials,
                kind,
                &scratch,
                &NoProgress,
            )
            .await;

        let path = match result {
            Ok(path) if path.is_file() => path,
            Ok(path) => return Err(AppError::ArtifactMissing(path.display().to_string())),
            Err(failure) => return Err(AppError::Extraction(failure.summary)),
        };

        Ok(ArtifactStream::open_guarded(&path, guard.with_file(&path)).await?)
    }

    /// Regular files in the downloads folder, sorted by name.
    pub async fn list_downloads(&self) -> AppResult<Vec<StoredFile>> {
        let mut entries = match tokio::fs::read_dir(&self.paths.download_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            files.push(StoredFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                path: entry.path().to_string_lossy().into_owned(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Path of a stored file, if `filename` is a plain name that exists.
    pub fn resolve_download(&self, filename: &str) -> Option<PathBuf> {
        if !is_plain_file_name(filename) {
            log::warn!("Rejected download file name {:?}", filename);
            return None;
        }
        let path = self.paths.download_dir.join(filename);
        path.is_file().then_some(path)
    }

    pub fn status(&self, key: &str) -> Option<OperationStatus> {
        self.tracker.get(key)
    }
}

fn require_url(url: &str) -> AppResult<&str> {
    let url = url.trim();
    if url.is_empty() {
        Err(AppError::Validation("URL is required".to_string()))
    } else {
        Ok(url)
    }
}
