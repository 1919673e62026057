//! YtDlpExtractor: the production extractor, powered by the yt-dlp binary.
//!
//! Each call spawns one yt-dlp process configured from a [`ResolvedConfig`].
//! Both pipes are read concurrently. `--print` puts yt-dlp in quiet mode, which
//! moves the progress template lines to stderr, so progress is parsed on
//! either pipe and forwarded to the caller's [`ProgressSink`] as each line
//! arrives. A failed run returns the `ERROR:` lines of stderr (plus any
//! storyboard warning) as the raw message for classification.

use crate::core::config;
use crate::download::config_space::MediaKind;
use crate::download::source::{Extractor, ExtractorError, ProgressSink, ResolvedConfig, VideoInfo};
use crate::download::ytdlp_errors::is_preview_only_hint;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Prefix of the machine-readable progress lines requested via `--progress-template`.
const PROGRESS_PREFIX: &str = "vidfront-progress";
/// Prefix of the final file path line requested via `--print`.
const FILEPATH_PREFIX: &str = "vidfront-file ";
/// How many stderr lines are kept for error reporting.
const STDERR_TAIL_LINES: usize = 200;

/// Extractor backed by the yt-dlp command line tool.
pub struct YtDlpExtractor {
    bin: String,
    metadata_timeout: Duration,
    download_timeout: Duration,
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new(config::YTDL_BIN.clone())
    }
}

impl YtDlpExtractor {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            metadata_timeout: config::extractor::metadata_timeout(),
            download_timeout: config::extractor::download_timeout(),
        }
    }

    /// Logs the installed yt-dlp version; a missing binary is only a warning.
    pub async fn log_version(&self) {
        match Command::new(&self.bin).arg("--version").output().await {
            Ok(output) if output.status.success() => {
                log::info!(
                    "yt-dlp version: {}",
                    String::from_utf8_lossy(&output.stdout).trim()
                );
            }
            Ok(output) => log::warn!("yt-dlp --version exited with {}", output.status),
            Err(e) => log::warn!("yt-dlp binary '{}' is not runnable: {}", self.bin, e),
        }
    }

    async fn run(
        &self,
        args: Vec<String>,
        timeout: Duration,
        progress: &dyn ProgressSink,
    ) -> Result<RunOutput, ExtractorError> {
        log::debug!("yt-dlp command: {} {}", self.bin, args.join(" "));

        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractorError::new(format!("Failed to spawn yt-dlp '{}': {}", self.bin, e)))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let read_stdout = async {
            let mut text = String::new();
            let mut filepath = None;
            if let Some(stream) = stdout {
                let mut reader = BufReader::new(stream);
                let mut buf = Vec::new();
                while let Some(line) = next_line(&mut reader, &mut buf).await {
                    match OutputLine::parse(&line) {
                        OutputLine::Progress(downloaded, total) => progress.on_progress(downloaded, total),
                        OutputLine::FilePath(path) => filepath = Some(path),
                        OutputLine::Text => {
                            text.push_str(&line);
                            text.push('\n');
                        }
                    }
                }
            }
            (text, filepath)
        };

        let read_stderr = async {
            let mut tail = VecDeque::new();
            let mut filepath = None;
            if let Some(stream) = stderr {
                let mut reader = BufReader::new(stream);
                let mut buf = Vec::new();
                while let Some(line) = next_line(&mut reader, &mut buf).await {
                    match OutputLine::parse(&line) {
                        OutputLine::Progress(downloaded, total) => progress.on_progress(downloaded, total),
                        OutputLine::FilePath(path) => filepath = Some(path),
                        OutputLine::Text => {
                            log::debug!("yt-dlp stderr: {}", line);
                            tail.push_back(line);
                            if tail.len() > STDERR_TAIL_LINES {
                                tail.pop_front();
                            }
                        }
                    }
                }
            }
            (tail, filepath)
        };

        let run = async {
            let ((stdout, stdout_path), (tail, stderr_path)) = tokio::join!(read_stdout, read_stderr);
            let status = child.wait().await;
            let output = RunOutput {
                stdout,
                filepath: stdout_path.or(stderr_path),
            };
            (output, Vec::from(tail), status)
        };

        let (output, stderr_tail, status) = match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                log::error!("yt-dlp process timed out after {}s, killing", timeout.as_secs());
                return Err(ExtractorError::new(format!(
                    "yt-dlp process timed out after {}s",
                    timeout.as_secs()
                )));
            }
        };

        let status = status.map_err(|e| ExtractorError::new(format!("yt-dlp process failed: {}", e)))?;
        if status.success() {
            return Ok(output);
        }

        let message = error_message_from_stderr(&stderr_tail)
            .unwrap_or_else(|| format!("yt-dlp exited with status {}", status));
        Err(ExtractorError::new(message))
    }
}

#[derive(Debug, Default)]
struct RunOutput {
    stdout: String,
    filepath: Option<PathBuf>,
}

/// What a single output line carries.
#[derive(Debug, PartialEq)]
enum OutputLine {
    Progress(u64, u64),
    FilePath(PathBuf),
    Text,
}

impl OutputLine {
    fn parse(line: &str) -> Self {
        if let Some((downloaded, total)) = parse_progress_line(line) {
            OutputLine::Progress(downloaded, total)
        } else if let Some(path) = line.strip_prefix(FILEPATH_PREFIX) {
            OutputLine::FilePath(PathBuf::from(path.trim()))
        } else {
            OutputLine::Text
        }
    }
}

/// Next line without its terminator. Invalid UTF-8 is replaced rather than
/// ending the read, so the pipe keeps draining.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    match reader.read_until(b'\n', buf).await {
        Ok(0) => None,
        Ok(_) => Some(
            String::from_utf8_lossy(buf)
                .trim_end_matches(|c: char| c == '\n' || c == '\r')
                .to_string(),
        ),
        Err(e) => {
            log::warn!("Failed to read yt-dlp output: {}", e);
            None
        }
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn extract_info(&self, url: &str, config: &ResolvedConfig) -> Result<VideoInfo, ExtractorError> {
        let args = build_info_args(url, config);
        let output = self.run(args, self.metadata_timeout, &crate::download::source::NoProgress).await?;
        let json: Value = serde_json::from_str(output.stdout.trim())
            .map_err(|e| ExtractorError::new(format!("Failed to parse yt-dlp JSON output: {}", e)))?;
        Ok(video_info_from_json(&json, config.relaxed))
    }

    async fn download(
        &self,
        url: &str,
        config: &ResolvedConfig,
        dest_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, ExtractorError> {
        let args = build_download_args(url, config, dest_dir);
        let output = self.run(args, self.download_timeout, progress).await?;

        if let Some(path) = output.filepath.filter(|p| p.is_file()) {
            return Ok(path);
        }
        first_file_in(dest_dir)
            .ok_or_else(|| ExtractorError::new(format!("yt-dlp produced no file in {}", dest_dir.display())))
    }
}

/// Arguments shared by metadata and download calls.
fn build_common_args(config: &ResolvedConfig) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--no-playlist".into(),
        "--user-agent".into(),
        config::extractor::USER_AGENT.into(),
        "--referer".into(),
        config::extractor::REFERER.into(),
        "--extractor-retries".into(),
        config::extractor::EXTRACTOR_RETRIES.to_string(),
    ];
    if let Some(clients) = config.persona.player_client_arg() {
        args.push("--extractor-args".into());
        args.push(format!("youtube:player_client={}", clients));
    }
    if let Some(cookies) = &config.cookies_file {
        args.push("--cookies".into());
        args.push(cookies.to_string_lossy().into_owned());
    }
    args
}

fn build_info_args(url: &str, config: &ResolvedConfig) -> Vec<String> {
    let mut args = build_common_args(config);
    args.extend(
        ["--dump-single-json", "--skip-download", "--no-warnings", "--quiet"]
            .iter()
            .map(|a| a.to_string()),
    );
    if config.relaxed {
        args.push("--flat-playlist".into());
        args.push("--ignore-no-formats-error".into());
    }
    args.push(url.to_string());
    args
}

fn build_download_args(url: &str, config: &ResolvedConfig, dest_dir: &Path) -> Vec<String> {
    let mut args = build_common_args(config);
    args.push("-o".into());
    args.push(dest_dir.join("%(title)s.%(ext)s").to_string_lossy().into_owned());
    if let Some(selector) = &config.selector {
        args.push("-f".into());
        args.push(selector.as_str().to_string());
    }
    args.extend(
        [
            "--newline",
            "--no-simulate",
            "--progress",
            "--progress-template",
        ]
        .iter()
        .map(|a| a.to_string()),
    );
    args.push(format!(
        "download:{} %(progress.downloaded_bytes)s %(progress.total_bytes)s %(progress.total_bytes_estimate)s",
        PROGRESS_PREFIX
    ));
    args.push("--print".into());
    args.push(format!("after_move:{}%(filepath)s", FILEPATH_PREFIX));
    if config.kind == MediaKind::Audio {
        args.extend(
            ["-x", "--audio-format", "mp3", "--audio-quality", "192K"]
                .iter()
                .map(|a| a.to_string()),
        );
    }
    args.push(url.to_string());
    args
}

/// Parses `vidfront-progress <downloaded> <total> <estimate>`; yt-dlp prints
/// `NA` for unknown fields. Total falls back to the estimate, then to 0.
fn parse_progress_line(line: &str) -> Option<(u64, u64)> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.split_whitespace().map(parse_number);
    let downloaded = fields.next().flatten()?;
    let total = fields.next().flatten();
    let estimate = fields.next().flatten();
    Some((downloaded, total.or(estimate).unwrap_or(0)))
}

fn parse_number(field: &str) -> Option<u64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64)
}

/// Picks the `ERROR:` lines and storyboard warnings in order, or the last few
/// lines when there are none.
fn error_message_from_stderr(lines: &[String]) -> Option<String> {
    let errors: Vec<&str> = lines
        .iter()
        .map(String::as_str)
        .filter(|l| {
            l.starts_with("ERROR:") || (l.starts_with("WARNING:") && is_preview_only_hint(l, &l.to_lowercase()))
        })
        .collect();
    if !errors.is_empty() {
        return Some(errors.join("\n"));
    }
    let tail: Vec<&str> = lines
        .iter()
        .rev()
        .map(String::as_str)
        .filter(|l| !l.trim().is_empty() && !l.starts_with(PROGRESS_PREFIX))
        .take(5)
        .collect();
    if tail.is_empty() {
        None
    } else {
        Some(tail.into_iter().rev().collect::<Vec<_>>().join("\n"))
    }
}

fn video_info_from_json(json: &Value, relaxed: bool) -> VideoInfo {
    let text = |key: &str, default: &str| {
        json.get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };
    VideoInfo {
        title: text("title", "Unknown"),
        duration: json.get("duration").and_then(Value::as_f64).unwrap_or(0.0),
        thumbnail: text("thumbnail", ""),
        format_count: if relaxed {
            0
        } else {
            json.get("formats").and_then(Value::as_array).map(Vec::len).unwrap_or(0)
        },
        uploader: text("uploader", "Unknown"),
        view_count: json.get("view_count").and_then(Value::as_u64).unwrap_or(0),
    }
}

fn first_file_in(dir: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files.into_iter().next()
}
