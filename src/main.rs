use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;

use vidfront::cli::{Cli, Commands};
use vidfront::core::{config, init_logger, log_cookies_configuration, web_server};
use vidfront::download::config_space::{MediaKind, Quality};
use vidfront::download::service::{DownloadService, ServicePaths};
use vidfront::download::source::{ProgressSink, YtDlpExtractor};
use vidfront::download::status::StatusTracker;

/// Entry point: parses CLI arguments and dispatches to the subcommand.
///
/// # Errors
/// Returns an error if logging cannot be initialized or the command fails.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // .env must be loaded before the first config static is touched
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Serve { port }) => run_server(port.unwrap_or(*config::PORT)).await,
        Some(Commands::Info { url, json }) => run_cli_info(url, json).await,
        Some(Commands::Download {
            url,
            format,
            quality,
            output,
        }) => run_cli_download(url, format, quality, output).await,
        None => {
            log::info!("No command specified, starting the server");
            run_server(*config::PORT).await
        }
    }
}

fn build_service(paths: ServicePaths) -> Arc<DownloadService> {
    let extractor = Arc::new(YtDlpExtractor::default());
    let tracker = Arc::new(StatusTracker::from_env());
    Arc::new(DownloadService::new(extractor, tracker, paths))
}

async fn run_server(port: u16) -> Result<()> {
    log::info!("Starting vidfront (debug: {})", config::is_debug_mode());
    log_cookies_configuration();
    YtDlpExtractor::default().log_version().await;

    let service = build_service(ServicePaths::from_env());
    tokio::fs::create_dir_all(&service.paths().download_dir).await?;

    web_server::start_web_server(port, service)
        .await
        .map_err(|e| anyhow::anyhow!("Web server failed: {}", e))
}

async fn run_cli_info(url: String, json: bool) -> Result<()> {
    let service = build_service(ServicePaths::from_env());
    let info = service.info(&url).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Title: {}", info.title);
        println!("Uploader: {}", info.uploader);
        println!("Duration: {}s", info.duration);
        println!("Views: {}", info.view_count);
        println!("Formats: {}", info.format_count);
        println!("Thumbnail: {}", info.thumbnail);
    }
    Ok(())
}

/// Prints a percentage line whenever the whole-percent value changes.
struct ConsoleProgress {
    last: std::sync::atomic::AtomicU64,
}

impl ProgressSink for ConsoleProgress {
    fn on_progress(&self, downloaded: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = downloaded.saturating_mul(100) / total;
        let previous = self.last.swap(percent, std::sync::atomic::Ordering::Relaxed);
        if percent != previous {
            println!("  {}%", percent.min(100));
        }
    }
}

async fn run_cli_download(url: String, kind: MediaKind, quality: Quality, output: Option<String>) -> Result<()> {
    let mut paths = ServicePaths::from_env();
    if let Some(output) = output {
        paths.download_dir = config::expand_path(&output);
    }

    println!("🎬 vidfront download");
    println!("URL: {}", url);
    println!("Format: {} / {}", kind.as_str(), quality.as_str());
    println!("Output: {}", paths.download_dir.display());

    let service = build_service(paths);
    let progress = ConsoleProgress {
        last: std::sync::atomic::AtomicU64::new(u64::MAX),
    };
    let path = service.download_to_storage(&url, kind, quality, &progress).await?;

    println!("✅ Saved to {}", path.display());
    Ok(())
}
