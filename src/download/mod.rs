//! Download management: extractor backends and everything around them

pub mod config_space;
pub mod fallback;
pub mod service;
pub mod source;
pub mod status;
pub mod stream;
pub mod ytdlp_errors;

pub use fallback::{AttemptFailure, RetryController};
pub use service::DownloadService;
pub use source::{Extractor, YtDlpExtractor};
pub use status::StatusTracker;
