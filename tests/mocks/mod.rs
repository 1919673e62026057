//! Mock implementations for integration tests
//!
//! Scripted stand-ins for the extractor so the fallback controller, the
//! service and the HTTP routes run without yt-dlp or the network.

pub mod mock_extractor;

pub use mock_extractor::{MockExtractor, RecordedCall, Step};
