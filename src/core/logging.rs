//! Logging initialization and configuration checking
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Cookies configuration logging at startup

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// Debug level is used unless `APP_ENV=production`.
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;
    let level = level_for(config::is_debug_mode());

    CombinedLogger::init(vec![
        TermLogger::new(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

fn level_for(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Logs cookies configuration at application startup
///
/// The cookies file is re-checked on every request, so this only reports
/// which persona ordering the first requests will use.
pub fn log_cookies_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🍪 Cookies Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let cookies_path = config::cookies_path();
    if cookies_path.exists() {
        match cookies_path.canonicalize() {
            Ok(abs_path) => log::info!("✅ YTDL_COOKIES_FILE: {}", abs_path.display()),
            Err(_) => log::warn!(
                "⚠️  YTDL_COOKIES_FILE: {} (exists but cannot canonicalize)",
                cookies_path.display()
            ),
        }
        log::info!("   Authenticated client order will be used");
    } else {
        log::warn!("⚠️  YTDL_COOKIES_FILE: {} (not found)", cookies_path.display());
        log::warn!("   Unauthenticated client order will be used");
        log::warn!("   Export cookies from your browser as cookies.txt if videos fail with bot checks");
    }
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
