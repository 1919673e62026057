//! Persona/selector fallback for extractor calls.
//!
//! Walks the persona × selector grid one combination at a time:
//! - format errors move to the next selector of the same persona
//! - merge and preview-only errors get one in-place retry with an override selector
//! - metadata lookups retry a format error once in relaxed mode
//! - everything else moves to the next persona
//!
//! The policy lives in [`next_state`], a pure function, so it is tested
//! without an extractor. [`RetryController::attempt`] only executes it.

use crate::core::metrics;
use crate::core::utils::truncate_with_ellipsis;
use crate::download::config_space::{ClientPersona, FormatSelector, MediaKind};
use crate::download::source::{Extractor, ExtractorError, ProgressSink, ResolvedConfig, VideoInfo};
use crate::download::ytdlp_errors::{BlockReason, ClassifiedError, ErrorClass, ErrorClassifier};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Raw error excerpt length in the failure summary
const ERROR_EXCERPT_CHARS: usize = 100;

const COOKIES_REQUIRED: &str = "COOKIES REQUIRED: Please export cookies from your browser \
(use an extension like \"Get cookies.txt LOCALLY\") and save them as cookies.txt in the \
project directory. This is essential for accessing the platform's videos.";

const COOKIES_PRESENT: &str = "Cookies are present but access is still blocked. The video may be \
region-restricted, age-restricted, or the platform may be rate-limiting. Try: 1) Refreshing \
cookies, 2) Waiting a few minutes, 3) Checking if the video is accessible in your browser.";

/// Which extractor call is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Metadata,
    Download,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Metadata => "metadata",
            OperationKind::Download => "download",
        }
    }

    fn summary_prefix(&self) -> &'static str {
        match self {
            OperationKind::Metadata => "Failed to access video.",
            OperationKind::Download => "Failed to download video.",
        }
    }
}

/// Replacement applied for a single in-place retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Override {
    /// `best`: one stream, nothing to merge
    SingleStream,
    /// mp4 if possible, else a small stream, else anything
    PreviewSafe,
    /// Metadata without format validation
    Relaxed,
}

/// Position in the persona × selector grid (indices into the plan).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    TryingSelector {
        persona: usize,
        selector: usize,
    },
    RetryingWithOverride {
        persona: usize,
        selector: usize,
        with: Override,
    },
    Exhausted,
}

impl AttemptState {
    /// First state for a grid of the given size.
    pub fn initial(persona_count: usize, selector_count: usize) -> Self {
        if persona_count == 0 || selector_count == 0 {
            AttemptState::Exhausted
        } else {
            AttemptState::TryingSelector {
                persona: 0,
                selector: 0,
            }
        }
    }
}

fn next_persona(persona: usize, persona_count: usize) -> AttemptState {
    if persona + 1 < persona_count {
        AttemptState::TryingSelector {
            persona: persona + 1,
            selector: 0,
        }
    } else {
        AttemptState::Exhausted
    }
}

/// Where to go after a failed attempt.
pub fn next_state(
    state: AttemptState,
    class: ErrorClass,
    operation: OperationKind,
    persona_count: usize,
    selector_count: usize,
) -> AttemptState {
    match state {
        AttemptState::Exhausted => AttemptState::Exhausted,
        // An override is a single shot; whatever happens, the persona is done.
        AttemptState::RetryingWithOverride { persona, .. } => next_persona(persona, persona_count),
        AttemptState::TryingSelector { persona, selector } => match (operation, class) {
            // Storyboard-only videos also fail format validation on metadata lookups.
            (OperationKind::Metadata, ErrorClass::FormatUnavailable | ErrorClass::OnlyPreviewAssetsAvailable) => {
                AttemptState::RetryingWithOverride {
                    persona,
                    selector,
                    with: Override::Relaxed,
                }
            }
            (OperationKind::Download, ErrorClass::FormatUnavailable) => {
                if selector + 1 < selector_count {
                    AttemptState::TryingSelector {
                        persona,
                        selector: selector + 1,
                    }
                } else {
                    next_persona(persona, persona_count)
                }
            }
            (OperationKind::Download, ErrorClass::MergeRequiresExternalTool) => AttemptState::RetryingWithOverride {
                persona,
                selector,
                with: Override::SingleStream,
            },
            (OperationKind::Download, ErrorClass::OnlyPreviewAssetsAvailable) => AttemptState::RetryingWithOverride {
                persona,
                selector,
                with: Override::PreviewSafe,
            },
            _ => next_persona(persona, persona_count),
        },
    }
}

/// Every combination failed.
#[derive(Debug, Clone, Error)]
#[error("{summary}")]
pub struct AttemptFailure {
    /// One entry per failed attempt, in order
    pub errors: Vec<ClassifiedError>,
    /// Human-readable explanation for the caller
    pub summary: String,
}

/// Builds the caller-facing explanation from every recorded failure.
pub fn summarize(operation: OperationKind, errors: &[ClassifiedError], has_stored_credentials: bool) -> String {
    let seen = |reason: BlockReason| errors.iter().any(|e| e.class == ErrorClass::AccessBlocked(reason));

    let mut summary = format!("{} ", operation.summary_prefix());
    if seen(BlockReason::BotDetection) {
        summary.push_str("The platform is blocking automated requests. ");
    } else if seen(BlockReason::Unavailable) {
        summary.push_str("Video may be unavailable or restricted. ");
    } else if seen(BlockReason::Private) {
        summary.push_str("Video may be private or unlisted. ");
    }

    summary.push_str(if has_stored_credentials {
        COOKIES_PRESENT
    } else {
        COOKIES_REQUIRED
    });

    if let Some(first) = errors.first() {
        summary.push_str(" Error: ");
        summary.push_str(&truncate_with_ellipsis(&first.raw, ERROR_EXCERPT_CHARS));
    }
    summary
}

/// What to try: the grid plus the inputs every resolved config shares.
#[derive(Debug, Clone)]
pub struct AttemptPlan<'a> {
    pub personas: &'a [ClientPersona],
    /// `None` entries mean "no selector" (metadata)
    pub selectors: Vec<Option<FormatSelector>>,
    pub credentials: Option<&'a Path>,
    pub kind: MediaKind,
}

impl<'a> AttemptPlan<'a> {
    /// Metadata plan: one selector-less slot per persona.
    pub fn metadata(personas: &'a [ClientPersona], credentials: Option<&'a Path>) -> Self {
        Self {
            personas,
            selectors: vec![None],
            credentials,
            kind: MediaKind::Video,
        }
    }

    pub fn download(
        personas: &'a [ClientPersona],
        selectors: &[FormatSelector],
        credentials: Option<&'a Path>,
        kind: MediaKind,
    ) -> Self {
        Self {
            personas,
            selectors: selectors.iter().cloned().map(Some).collect(),
            credentials,
            kind,
        }
    }

    fn resolve(&self, state: AttemptState) -> Option<ResolvedConfig> {
        let (persona, selector, with) = match state {
            AttemptState::TryingSelector { persona, selector } => (persona, selector, None),
            AttemptState::RetryingWithOverride { persona, selector, with } => (persona, selector, Some(with)),
            AttemptState::Exhausted => return None,
        };
        let base = ResolvedConfig::new(
            self.personas.get(persona)?,
            self.selectors.get(selector)?.clone(),
            self.credentials,
            self.kind,
        );
        Some(match with {
            None => base,
            Some(Override::SingleStream) => base.with_selector(FormatSelector::single_stream()),
            Some(Override::PreviewSafe) => base.with_selector(FormatSelector::preview_safe()),
            Some(Override::Relaxed) => base.relaxed(),
        })
    }
}

/// Drives an extractor through an [`AttemptPlan`].
#[derive(Debug, Default)]
pub struct RetryController {
    classifier: ErrorClassifier,
}

impl RetryController {
    pub fn new(classifier: ErrorClassifier) -> Self {
        Self { classifier }
    }

    /// Runs `call` once per combination until one succeeds.
    ///
    /// Attempts are strictly sequential. Every failure is classified and
    /// recorded; when the grid is exhausted the failures and a summary are
    /// returned.
    pub async fn attempt<T, F, Fut>(
        &self,
        operation: OperationKind,
        plan: &AttemptPlan<'_>,
        mut call: F,
    ) -> Result<T, AttemptFailure>
    where
        F: FnMut(ResolvedConfig) -> Fut,
        Fut: Future<Output = Result<T, ExtractorError>>,
    {
        let started = Instant::now();
        let persona_count = plan.personas.len();
        let selector_count = plan.selectors.len();
        let mut errors: Vec<ClassifiedError> = Vec::new();
        let mut state = AttemptState::initial(persona_count, selector_count);

        while let Some(config) = plan.resolve(state) {
            log::info!(
                "🔄 {} attempt {}: persona={}, selector={}, cookies={}{}",
                operation.as_str(),
                errors.len() + 1,
                config.persona,
                config.selector.as_ref().map(FormatSelector::as_str).unwrap_or("-"),
                config.cookies_file.is_some(),
                if config.relaxed { ", relaxed" } else { "" }
            );

            match call(config).await {
                Ok(value) => {
                    metrics::record_attempt(operation.as_str(), "success");
                    metrics::OPERATION_DURATION_SECONDS
                        .with_label_values(&[operation.as_str()])
                        .observe(started.elapsed().as_secs_f64());
                    if !errors.is_empty() {
                        log::info!(
                            "✅ {} succeeded after {} failed attempt(s)",
                            operation.as_str(),
                            errors.len()
                        );
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let classified = self.classifier.classify_error(err.message);
                    metrics::record_attempt(operation.as_str(), classified.class.label());
                    log::warn!(
                        "❌ {} attempt failed ({}): {}",
                        operation.as_str(),
                        classified.class,
                        truncate_with_ellipsis(&classified.raw, 300)
                    );
                    state = next_state(state, classified.class, operation, persona_count, selector_count);
                    errors.push(classified);
                }
            }
        }

        let has_credentials = plan.credentials.is_some();
        let summary = summarize(operation, &errors, has_credentials);
        metrics::record_exhausted(operation.as_str());
        metrics::OPERATION_DURATION_SECONDS
            .with_label_values(&[operation.as_str()])
            .observe(started.elapsed().as_secs_f64());
        log::error!(
            "All {} attempts failed across {} persona(s) ({} errors recorded)",
            operation.as_str(),
            persona_count,
            errors.len()
        );
        Err(AttemptFailure { errors, summary })
    }

    /// Metadata lookup across `personas`.
    pub async fn fetch_info(
        &self,
        extractor: &dyn Extractor,
        url: &str,
        personas: &[ClientPersona],
        credentials: Option<&Path>,
    ) -> Result<VideoInfo, AttemptFailure> {
        let plan = AttemptPlan::metadata(personas, credentials);
        self.attempt(OperationKind::Metadata, &plan, |config| async move {
            extractor.extract_info(url, &config).await
        })
        .await
    }

    /// Download across `personas` × `selectors` into `dest_dir`.
    #[allow(clippy::too_many_arguments)]
    pub async fn download(
        &self,
        extractor: &dyn Extractor,
        url: &str,
        personas: &[ClientPersona],
        selectors: &[FormatSelector],
        credentials: Option<&Path>,
        kind: MediaKind,
        dest_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf, AttemptFailure> {
        let plan = AttemptPlan::download(personas, selectors, credentials, kind);
        self.attempt(OperationKind::Download, &plan, |config| async move {
            extractor.download(url, &config, dest_dir, progress).await
        })
        .await
    }
}
