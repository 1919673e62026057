//! Classification of yt-dlp failure messages.
//!
//! yt-dlp only reports failures as free text, so classification is a list of
//! substring rules tried in order. The first matching rule wins and anything
//! unmatched is [`ErrorClass::Unknown`]. Rule order matters. A failed run
//! often carries several hints at once ("Only images are available" warns
//! before "Requested format is not available" fails), so the rules that
//! unlock an override come first: merge, then preview, then format. The
//! format rule must also claim "Requested format is not available" before the
//! generic "not available" rule sees it.

use std::fmt;

/// Why a site refused to serve the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockReason {
    /// "Sign in to confirm you're not a bot" and friends
    BotDetection,
    /// Private or unlisted video
    Private,
    /// Removed, region-locked or otherwise unavailable
    Unavailable,
}

/// Failure classes the fallback controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The selector matched no stream for this persona
    FormatUnavailable,
    /// Selected streams need ffmpeg to merge and it is missing
    MergeRequiresExternalTool,
    /// Only storyboard / preview images were offered
    OnlyPreviewAssetsAvailable,
    /// Access refused for the given reason
    AccessBlocked(BlockReason),
    /// Nothing matched
    Unknown,
}

impl ErrorClass {
    /// Stable label for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            ErrorClass::FormatUnavailable => "format_unavailable",
            ErrorClass::MergeRequiresExternalTool => "merge_requires_ffmpeg",
            ErrorClass::OnlyPreviewAssetsAvailable => "only_preview_assets",
            ErrorClass::AccessBlocked(BlockReason::BotDetection) => "bot_detection",
            ErrorClass::AccessBlocked(BlockReason::Private) => "private",
            ErrorClass::AccessBlocked(BlockReason::Unavailable) => "unavailable",
            ErrorClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One failed attempt: its class plus the raw extractor message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub class: ErrorClass,
    pub raw: String,
}

type Predicate = Box<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// A single classification rule. The predicate gets the raw message and its
/// lowercase form.
pub struct ClassifierRule {
    name: &'static str,
    predicate: Predicate,
    class: ErrorClass,
}

impl ClassifierRule {
    pub fn new<F>(name: &'static str, class: ErrorClass, predicate: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            predicate: Box::new(predicate),
            class,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ClassifierRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierRule")
            .field("name", &self.name)
            .field("class", &self.class)
            .finish()
    }
}

/// Ordered rule list with an explicit `Unknown` fallback.
#[derive(Debug)]
pub struct ErrorClassifier {
    rules: Vec<ClassifierRule>,
}

impl ErrorClassifier {
    /// Classifier with no rules; everything is `Unknown`.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule after the existing ones.
    #[must_use]
    pub fn with_rule(mut self, rule: ClassifierRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Classifies a raw message.
    pub fn classify(&self, raw: &str) -> ErrorClass {
        let lower = raw.to_lowercase();
        self.rules
            .iter()
            .find(|rule| (rule.predicate)(raw, &lower))
            .map(|rule| {
                log::debug!("Extractor error matched rule '{}' -> {}", rule.name, rule.class);
                rule.class
            })
            .unwrap_or(ErrorClass::Unknown)
    }

    /// Classifies and keeps the raw message.
    pub fn classify_error(&self, raw: impl Into<String>) -> ClassifiedError {
        let raw = raw.into();
        ClassifiedError {
            class: self.classify(&raw),
            raw,
        }
    }
}

/// True for yt-dlp's "only storyboards" wording. Also used to keep the
/// matching `WARNING:` line in the raw message.
pub fn is_preview_only_hint(raw: &str, lower: &str) -> bool {
    raw.contains("Only images are available") || lower.contains("storyboard")
}

impl Default for ErrorClassifier {
    /// The rules matching yt-dlp's current wording.
    fn default() -> Self {
        Self::empty()
            .with_rule(ClassifierRule::new(
                "ffmpeg_merge",
                ErrorClass::MergeRequiresExternalTool,
                |_, lower| lower.contains("ffmpeg") && lower.contains("merging"),
            ))
            .with_rule(ClassifierRule::new(
                "preview_only",
                ErrorClass::OnlyPreviewAssetsAvailable,
                |raw, lower| is_preview_only_hint(raw, lower),
            ))
            .with_rule(ClassifierRule::new(
                "format",
                ErrorClass::FormatUnavailable,
                |raw, _| raw.contains("format is not available") || raw.contains("Requested format"),
            ))
            .with_rule(ClassifierRule::new(
                "bot_detection",
                ErrorClass::AccessBlocked(BlockReason::BotDetection),
                |raw, lower| lower.contains("bot") || raw.contains("Sign in"),
            ))
            .with_rule(ClassifierRule::new(
                "unavailable",
                ErrorClass::AccessBlocked(BlockReason::Unavailable),
                |_, lower| lower.contains("not available") || lower.contains("unavailable"),
            ))
            .with_rule(ClassifierRule::new(
                "private",
                ErrorClass::AccessBlocked(BlockReason::Private),
                |_, lower| lower.contains("private") || lower.contains("unlisted"),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(msg: &str) -> ErrorClass {
        ErrorClassifier::default().classify(msg)
    }

    #[test]
    fn test_format_unavailable() {
        assert_eq!(
            classify("ERROR: [youtube] abc: Requested format is not available. Use --list-formats"),
            ErrorClass::FormatUnavailable
        );
    }

    #[test]
    fn test_merge_requires_ffmpeg() {
        assert_eq!(
            classify("ERROR: You have requested merging of multiple formats but ffmpeg is not installed"),
            ErrorClass::MergeRequiresExternalTool
        );
    }

    #[test]
    fn test_preview_only() {
        assert_eq!(
            classify("WARNING: Only images are available for download. use --list-formats"),
            ErrorClass::OnlyPreviewAssetsAvailable
        );
        assert_eq!(classify("got Storyboard formats only"), ErrorClass::OnlyPreviewAssetsAvailable);
    }

    #[test]
    fn test_preview_warning_wins_over_format_error() {
        let stderr = "WARNING: [youtube] abc: Only images are available for download. use --list-formats to see them\n\
                      ERROR: [youtube] abc: Requested format is not available. Use --list-formats for a list of available formats";
        assert_eq!(classify(stderr), ErrorClass::OnlyPreviewAssetsAvailable);
    }

    #[test]
    fn test_merge_wins_over_format_error() {
        let stderr = "ERROR: Requested format is not available\n\
                      ERROR: You have requested merging of multiple formats but ffmpeg is not installed";
        assert_eq!(classify(stderr), ErrorClass::MergeRequiresExternalTool);
    }

    #[test]
    fn test_bot_detection() {
        assert_eq!(
            classify("ERROR: [youtube] abc: Sign in to confirm you're not a bot."),
            ErrorClass::AccessBlocked(BlockReason::BotDetection)
        );
    }

    #[test]
    fn test_unavailable() {
        assert_eq!(
            classify("ERROR: [youtube] abc: Video unavailable. This video has been removed"),
            ErrorClass::AccessBlocked(BlockReason::Unavailable)
        );
    }

    #[test]
    fn test_private() {
        assert_eq!(
            classify("ERROR: [youtube] abc: Private video"),
            ErrorClass::AccessBlocked(BlockReason::Private)
        );
    }

    #[test]
    fn test_unknown_fallback() {
        assert_eq!(classify("ERROR: HTTP Error 500: Internal Server Error"), ErrorClass::Unknown);
        assert_eq!(ErrorClassifier::empty().classify("Requested format"), ErrorClass::Unknown);
    }

    #[test]
    fn test_custom_rule_is_appended_after_defaults() {
        let classifier = ErrorClassifier::default().with_rule(ClassifierRule::new(
            "rate_limit",
            ErrorClass::AccessBlocked(BlockReason::BotDetection),
            |_, lower| lower.contains("http error 429"),
        ));
        assert_eq!(
            classifier.classify("ERROR: HTTP Error 429: Too Many Requests"),
            ErrorClass::AccessBlocked(BlockReason::BotDetection)
        );
    }

    #[test]
    fn test_classify_error_keeps_raw() {
        let err = ErrorClassifier::default().classify_error("Private video");
        assert_eq!(err.raw, "Private video");
        assert_eq!(err.class.label(), "private");
    }
}
