//! vidfront - web front end for video metadata and downloads
//!
//! All platform protocol work is delegated to yt-dlp. This crate adds the
//! client-persona fallback strategy, HTTP handling with file streaming, and
//! progress bookkeeping for background downloads.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, metrics and the HTTP server
//! - `download`: extractor backends, fallback controller, status store, streaming
//! - `cli`: command line interface

pub mod cli;
pub mod core;
pub mod download;

pub use core::error::{AppError, AppResult};
pub use download::service::DownloadService;
