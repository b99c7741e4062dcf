//! Error types shared by every scraping strategy.

use std::time::Duration;

use thiserror::Error;

use crate::scrapers::resolver::Stage;

/// Coarse classification callers use to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something incomplete or invalid. Never retried.
    Configuration,
    /// Resolution, navigation or extraction failed.
    Execution,
    /// A bounded wait was exceeded. Callers may retry with backoff.
    Timeout,
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Execution(String),

    /// The navigation resolver gave up at `stage`.
    #[error("{stage}: {message}")]
    Navigation { stage: Stage, message: String },

    #[error("{operation} timed out after {}s", .after.as_secs_f64())]
    Timeout { operation: String, after: Duration },

    /// Misuse of a runtime (for example a blocking call from its own worker thread).
    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScrapeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Execution(_)
            | Self::Navigation { .. }
            | Self::Runtime(_)
            | Self::Http(_)
            | Self::Io(_)
            | Self::Other(_) => ErrorKind::Execution,
        }
    }

    /// Resolver stage at which the failure happened, when known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Navigation { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Map an error leaving a strategy into the public taxonomy.
    ///
    /// Errors that already belong to the taxonomy pass through untouched;
    /// anything else is wrapped into `Execution` carrying its message.
    pub fn at_strategy_boundary(self) -> Self {
        match self {
            Self::Configuration(_)
            | Self::Execution(_)
            | Self::Navigation { .. }
            | Self::Timeout { .. } => self,
            other => Self::Execution(other.to_string()),
        }
    }
}

pub type Result<T, E = ScrapeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ScrapeError::configuration("x").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            ScrapeError::timeout("job", Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            ScrapeError::Runtime("x".into()).kind(),
            ErrorKind::Execution
        );
    }

    #[test]
    fn test_boundary_wraps_once_and_keeps_message() {
        let err = ScrapeError::Other(anyhow::anyhow!("socket closed")).at_strategy_boundary();
        match &err {
            ScrapeError::Execution(msg) => assert_eq!(msg, "socket closed"),
            other => panic!("unexpected {other:?}"),
        }
        // Second pass is a no-op.
        assert!(matches!(
            err.at_strategy_boundary(),
            ScrapeError::Execution(_)
        ));
    }

    #[test]
    fn test_navigation_message_embeds_stage() {
        let err = ScrapeError::Navigation {
            stage: Stage::SearchInputFocus,
            message: "no input".into(),
        };
        assert_eq!(err.to_string(), "focus_search_input: no input");
        assert_eq!(err.stage(), Some(Stage::SearchInputFocus));
        assert_eq!(err.kind(), ErrorKind::Execution);
    }
}
