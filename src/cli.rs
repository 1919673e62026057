use clap::{Parser, Subcommand};

use crate::download::config_space::{MediaKind, Quality};

#[derive(Parser)]
#[command(name = "vidfront")]
#[command(author, version, about = "Video metadata and downloads over HTTP, backed by yt-dlp", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (defaults to PORT or 5000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print metadata for a video
    Info {
        /// Video URL
        url: String,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Download a video into a folder
    Download {
        /// Video URL
        url: String,

        /// video or audio
        #[arg(short, long, value_parser = parse_kind, default_value = "video")]
        format: MediaKind,

        /// best, 720p, 480p or 360p
        #[arg(short, long, value_parser = parse_quality, default_value = "best")]
        quality: Quality,

        /// Output folder (defaults to DOWNLOAD_FOLDER)
        #[arg(short, long)]
        output: Option<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

fn parse_kind(value: &str) -> Result<MediaKind, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("unknown format '{}', expected video or audio", value))
}

fn parse_quality(value: &str) -> Result<Quality, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("unknown quality '{}', expected best, 720p, 480p or 360p", value))
}
