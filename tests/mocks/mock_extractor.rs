//! Scripted extractor
//!
//! Each call pops the next [`Step`] from the script; once the script is empty
//! the fallback step (if any) is repeated. Every call is recorded with the
//! resolved configuration it received.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use vidfront::download::source::{Extractor, ExtractorError, ProgressSink, ResolvedConfig, VideoInfo};

/// One scripted response
#[derive(Debug, Clone)]
pub enum Step {
    /// Fail with this raw message
    Fail(String),
    /// Metadata success
    Info(VideoInfo),
    /// Write `bytes` to `dest_dir/name`, report `progress`, succeed
    Download {
        name: String,
        bytes: Vec<u8>,
        progress: Vec<(u64, u64)>,
    },
    /// Write `dest_dir/name` as a partial file, then never return
    Hang { name: String },
}

impl Step {
    pub fn fail(message: &str) -> Self {
        Step::Fail(message.to_string())
    }

    pub fn download(name: &str, bytes: &[u8]) -> Self {
        Step::Download {
            name: name.to_string(),
            bytes: bytes.to_vec(),
            progress: vec![(bytes.len() as u64 / 2, bytes.len() as u64), (bytes.len() as u64, bytes.len() as u64)],
        }
    }

    pub fn hang(name: &str) -> Self {
        Step::Hang { name: name.to_string() }
    }

    pub fn info(title: &str, format_count: usize) -> Self {
        Step::Info(sample_info(title, format_count))
    }
}

pub fn sample_info(title: &str, format_count: usize) -> VideoInfo {
    VideoInfo {
        title: title.to_string(),
        duration: 212.0,
        thumbnail: "https://i.ytimg.com/vi/abc/hqdefault.jpg".to_string(),
        format_count,
        uploader: "Test Channel".to_string(),
        view_count: 1_000,
    }
}

/// A call the extractor received
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// "metadata" or "download"
    pub operation: &'static str,
    pub url: String,
    pub config: ResolvedConfig,
}

impl RecordedCall {
    /// `player_client` value, or "default"
    pub fn persona(&self) -> String {
        self.config
            .persona
            .player_client_arg()
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn selector(&self) -> Option<&str> {
        self.config.selector.as_ref().map(|s| s.as_str())
    }
}

pub struct MockExtractor {
    script: Mutex<VecDeque<Step>>,
    fallback: Option<Step>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockExtractor {
    pub fn scripted(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Repeats `step` for every call after the script runs out.
    pub fn then_always(mut self, step: Step) -> Self {
        self.fallback = Some(step);
        self
    }

    pub fn always(step: Step) -> Self {
        Self::scripted(Vec::new()).then_always(step)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_step(&self, operation: &'static str, url: &str, config: &ResolvedConfig) -> Step {
        self.calls.lock().unwrap().push(RecordedCall {
            operation,
            url: url.to_string(),
            config: config.clone(),
        });
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Step::fail("ERROR: mock script exhausted"))
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract_info(&self, url: &str, config: &ResolvedConfig) -> Result<VideoInfo, ExtractorError> {
        match self.next_step("metadata", url, config) {
            Step::Info(mut info) => {
                if config.relaxed {
                    info.format_count = 0;
                }
                Ok(info)
            }
            Step::Fail(message) => Err(ExtractorError::new(message)),
            Step::Download { .. } => Err(ExtractorError::new("mock: download step used for metadata")),
            Step::Hang { .. } => std::future::pending().await,
        }
    }

    async fn download(
        &self,
        url: &str,
        config: &ResolvedConfig,
        dest_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, ExtractorError> {
        match self.next_step("download", url, config) {
            Step::Download {
                name,
                bytes,
                progress: updates,
            } => {
                for (downloaded, total) in updates {
                    progress.on_progress(downloaded, total);
                }
                let path = dest_dir.join(name);
                std::fs::write(&path, bytes).map_err(|e| ExtractorError::new(e.to_string()))?;
                Ok(path)
            }
            Step::Fail(message) => Err(ExtractorError::new(message)),
            Step::Hang { name } => {
                std::fs::write(dest_dir.join(name), b"partial").map_err(|e| ExtractorError::new(e.to_string()))?;
                std::future::pending().await
            }
            Step::Info(_) => Err(ExtractorError::new("mock: info step used for download")),
        }
    }
}
