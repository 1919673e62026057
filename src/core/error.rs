use thiserror::Error;

/// Centralized error types for the application
///
/// Failures from the extractor never surface here directly: the fallback
/// controller turns them into a summary string, which is carried by
/// [`AppError::Extraction`].
///
/// # Example
///
/// ```no_run
/// use vidfront::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Every persona/selector combination failed; carries the human-readable summary
    #[error("{0}")]
    Extraction(String),

    /// The extractor reported success but left no artifact behind
    #[error("Downloaded file not found: {0}")]
    ArtifactMissing(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Returns category for metrics and logs
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Extraction(_) => "extraction",
            AppError::ArtifactMissing(_) => "artifact_missing",
            AppError::Io(_) => "io",
            AppError::Validation(_) => "validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_error_displays_summary_verbatim() {
        let err = AppError::Extraction("Failed to download video. COOKIES REQUIRED".into());
        assert_eq!(err.to_string(), "Failed to download video. COOKIES REQUIRED");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppError = io.into();
        assert_eq!(err.category(), "io");
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_validation_category() {
        assert_eq!(AppError::Validation("bad".into()).category(), "validation");
    }
}
