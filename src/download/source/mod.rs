//! Extractor abstraction.
//!
//! The fallback controller never talks to yt-dlp directly; it calls an
//! [`Extractor`] with a fully resolved configuration. `YtDlpExtractor` is the
//! production backend, tests plug in scripted fakes.

pub mod ytdlp;

use crate::download::config_space::{ClientPersona, FormatSelector, MediaKind};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use ytdlp::YtDlpExtractor;

/// Metadata returned by a successful lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub title: String,
    pub duration: f64,
    pub thumbnail: String,
    pub format_count: usize,
    pub uploader: String,
    pub view_count: u64,
}

/// Raw failure reported by an extractor; classification happens later.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ExtractorError {
    pub message: String,
}

impl ExtractorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything one extractor call needs besides the URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub persona: ClientPersona,
    /// `None` for metadata lookups
    pub selector: Option<FormatSelector>,
    /// Cookies file, only when stored credentials exist and the persona allows them
    pub cookies_file: Option<PathBuf>,
    pub kind: MediaKind,
    /// Metadata only: skip format validation ("extract flat")
    pub relaxed: bool,
}

impl ResolvedConfig {
    /// Resolves a persona against the stored credentials.
    pub fn new(
        persona: &ClientPersona,
        selector: Option<FormatSelector>,
        credentials: Option<&Path>,
        kind: MediaKind,
    ) -> Self {
        let cookies_file = if persona.suppress_credentials {
            None
        } else {
            credentials.map(Path::to_path_buf)
        };
        Self {
            persona: persona.clone(),
            selector,
            cookies_file,
            kind,
            relaxed: false,
        }
    }

    #[must_use]
    pub fn relaxed(mut self) -> Self {
        self.relaxed = true;
        self
    }

    #[must_use]
    pub fn with_selector(mut self, selector: FormatSelector) -> Self {
        self.selector = Some(selector);
        self
    }
}

/// Receives byte progress while a download runs.
///
/// Called synchronously from inside [`Extractor::download`], interleaved with
/// the transfer.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, downloaded: u64, total: u64);
}

/// Sink that drops every update (streaming path, CLI).
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _downloaded: u64, _total: u64) {}
}

/// External extraction engine.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetch metadata without downloading.
    async fn extract_info(&self, url: &str, config: &ResolvedConfig) -> Result<VideoInfo, ExtractorError>;

    /// Download into `dest_dir`, returning the path of the produced file.
    async fn download(
        &self,
        url: &str,
        config: &ResolvedConfig,
        dest_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, ExtractorError>;
}
