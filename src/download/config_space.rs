//! Persona and format-selector tables for the fallback controller.
//!
//! Both tables are empirical reliability rankings found by trial against the
//! platform, not protocol requirements. Reorder them freely; the controller
//! only relies on "earlier entries are tried first".

use serde::{Deserialize, Serialize};
use std::fmt;

/// An emulated client identity presented to the extractor.
///
/// `clients` is passed as `youtube:player_client=...`; an empty list means
/// "let the extractor pick its defaults".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPersona {
    pub clients: Vec<&'static str>,
    pub suppress_credentials: bool,
}

impl ClientPersona {
    fn new(clients: Vec<&'static str>, suppress_credentials: bool) -> Self {
        Self {
            clients,
            suppress_credentials,
        }
    }

    /// `player_client` value for the extractor, `None` for the default persona
    pub fn player_client_arg(&self) -> Option<String> {
        if self.clients.is_empty() {
            None
        } else {
            Some(self.clients.join(","))
        }
    }
}

impl fmt::Display for ClientPersona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clients = self.player_client_arg().unwrap_or_else(|| "default".to_string());
        if self.suppress_credentials {
            write!(f, "{} (no cookies)", clients)
        } else {
            write!(f, "{}", clients)
        }
    }
}

/// A platform selection expression choosing which stream(s) to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatSelector(String);

impl FormatSelector {
    pub fn new(expr: impl Into<String>) -> Self {
        Self(expr.into())
    }

    /// Permissive single-stream selector; never needs merging.
    pub fn single_stream() -> Self {
        Self::new("best")
    }

    /// Selector chain used when only preview images came back.
    pub fn preview_safe() -> Self {
        Self::new("best[ext=mp4]/best[height<=360]/best")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormatSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the caller wants to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// `best` is accepted as an alias, older form builds posted it as the default.
    #[default]
    #[serde(alias = "best")]
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// Requested quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
}

impl Quality {
    /// Height cap in pixels, `None` for `best`
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Quality::Best => None,
            Quality::P720 => Some(720),
            Quality::P480 => Some(480),
            Quality::P360 => Some(360),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Best => "best",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
        }
    }
}

/// Persona order for downloads (server-storage and streaming paths).
///
/// With cookies the unauthenticated `android_vr` client goes first because it
/// needs neither a JS runtime nor ffmpeg; the account-tier aware default and
/// the two authenticated fallbacks follow, and plain `web` without cookies
/// closes the list.
pub fn personas_for(has_stored_credentials: bool) -> Vec<ClientPersona> {
    if has_stored_credentials {
        vec![
            ClientPersona::new(vec!["android_vr"], true),
            ClientPersona::new(vec![], false),
            ClientPersona::new(vec!["tv_downgraded", "web", "web_safari"], false),
            ClientPersona::new(vec!["tv_downgraded", "web_creator", "web"], false),
            ClientPersona::new(vec!["web"], true),
        ]
    } else {
        unauthenticated_personas()
    }
}

/// Persona order for metadata lookups.
///
/// With cookies the cookie-capable clients are tried first and `android_vr`
/// (which ignores cookies) is the last resort.
pub fn metadata_personas_for(has_stored_credentials: bool) -> Vec<ClientPersona> {
    if has_stored_credentials {
        vec![
            ClientPersona::new(vec![], false),
            ClientPersona::new(vec!["tv_downgraded", "web", "web_safari"], false),
            ClientPersona::new(vec!["tv_downgraded", "web_creator", "web"], false),
            ClientPersona::new(vec!["web"], false),
            ClientPersona::new(vec!["android_vr"], true),
        ]
    } else {
        unauthenticated_personas()
    }
}

fn unauthenticated_personas() -> Vec<ClientPersona> {
    vec![
        ClientPersona::new(vec!["android_vr"], false),
        ClientPersona::new(vec!["android_vr", "web", "web_safari"], false),
        ClientPersona::new(vec!["web"], false),
        ClientPersona::new(vec!["mweb", "web"], false),
        ClientPersona::new(vec![], false),
    ]
}

/// Ordered selectors for a download request.
///
/// Every list ends in a selector that works without merging, so a missing
/// ffmpeg never blocks the last attempt of a persona.
pub fn formats_for(kind: MediaKind, quality: Quality) -> Vec<FormatSelector> {
    match kind {
        MediaKind::Video => match quality.max_height() {
            None => vec![FormatSelector::single_stream()],
            Some(height) => vec![
                FormatSelector::new(format!("best[height<={}]", height)),
                FormatSelector::single_stream(),
            ],
        },
        MediaKind::Audio => vec![FormatSelector::new("bestaudio/best"), FormatSelector::single_stream()],
    }
}
