use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

// Configuration for the web front end.
// Every value is read once from the environment (a `.env` file is loaded first by `main`).

/// TCP port the HTTP server listens on
/// Read from PORT environment variable
/// Default: 5000
pub static PORT: Lazy<u16> = Lazy::new(|| {
    env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000)
});

/// Deployment environment
/// Read from APP_ENV environment variable
/// `production` disables debug logging
pub static APP_ENV: Lazy<String> = Lazy::new(|| env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()));

/// Returns true when debug mode is enabled (any environment except production)
pub fn is_debug_mode() -> bool {
    APP_ENV.as_str() != "production"
}

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Path to the Netscape-format cookies file
/// Read from YTDL_COOKIES_FILE environment variable
/// Its presence toggles the authenticated persona ordering
/// Default: cookies.txt
pub static YTDL_COOKIES_FILE: Lazy<String> =
    Lazy::new(|| env::var("YTDL_COOKIES_FILE").unwrap_or_else(|_| "cookies.txt".to_string()));

/// Folder for server-storage downloads
/// Read from DOWNLOAD_FOLDER environment variable
/// Supports tilde (~) expansion for home directory
/// Default: downloads
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "downloads".to_string()));

/// Parent directory for per-request scratch directories of the streaming path
/// Read from TEMP_FILES_DIR environment variable
/// Default: the OS temp directory
pub static TEMP_FILES_DIR: Lazy<String> = Lazy::new(|| {
    env::var("TEMP_FILES_DIR").unwrap_or_else(|_| env::temp_dir().to_string_lossy().into_owned())
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: vidfront.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "vidfront.log".to_string()));

/// Expands `~` in a configured path
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).to_string())
}

/// Resolved cookies file path
pub fn cookies_path() -> PathBuf {
    expand_path(&YTDL_COOKIES_FILE)
}

/// Resolved downloads folder
pub fn download_dir() -> PathBuf {
    expand_path(&DOWNLOAD_FOLDER)
}

/// Resolved scratch parent directory
pub fn temp_dir() -> PathBuf {
    expand_path(&TEMP_FILES_DIR)
}

/// Extractor request identity
pub mod extractor {
    use super::Duration;

    /// Desktop browser user agent presented to the platform
    pub const USER_AGENT: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    /// Referer header presented to the platform
    pub const REFERER: &str = "https://www.youtube.com/";

    /// Retries yt-dlp performs internally for extractor requests
    pub const EXTRACTOR_RETRIES: u32 = 3;

    /// Timeout for metadata calls (in seconds)
    pub const METADATA_TIMEOUT_SECS: u64 = 120;

    /// Timeout for download calls (in seconds)
    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 1800; // 30 minutes

    pub fn metadata_timeout() -> Duration {
        Duration::from_secs(METADATA_TIMEOUT_SECS)
    }

    pub fn download_timeout() -> Duration {
        Duration::from_secs(DOWNLOAD_TIMEOUT_SECS)
    }
}

/// Status store configuration
pub mod status {
    use super::Duration;
    use once_cell::sync::Lazy;
    use std::env;

    /// Seconds since the last update after which a status entry is evicted
    /// Read from STATUS_TTL_SECS environment variable
    /// Default: 3600
    pub static TTL_SECS: Lazy<u64> = Lazy::new(|| {
        env::var("STATUS_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600)
    });

    /// Interval between eviction sweeps (in seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 300;

    pub fn ttl() -> Duration {
        Duration::from_secs(*TTL_SECS)
    }

    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

/// Streaming delivery configuration
pub mod stream {
    /// Size of each response body chunk
    pub const CHUNK_SIZE: usize = 8 * 1024;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_keeps_relative_paths() {
        assert_eq!(expand_path("downloads"), PathBuf::from("downloads"));
    }

    #[test]
    fn test_chunk_size_is_8_kib() {
        assert_eq!(stream::CHUNK_SIZE, 8192);
    }
}
