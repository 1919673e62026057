//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod utils;
pub mod web_server;

pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_cookies_configuration};
