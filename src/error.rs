use thiserror::Error;

/// Crate-wide error type. Every failure is terminal for the operation that
/// raised it; nothing in here is retried automatically.
#[derive(Debug, Error)]
pub enum MagpieError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Bad directive: {0}")]
    Directive(String),

    #[error("Completion provider error: {0}")]
    Provider(String),

    #[error("No cost rate configured for model '{0}'")]
    UnknownModel(String),

    #[error("Scrape submission failed: {0}")]
    SubmitFailed(String),

    #[error("Scrape poll failed: {0}")]
    PollError(String),

    #[error("Malformed scrape result: {0}")]
    MalformedResult(String),

    #[error("Search provider error: {0}")]
    Search(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}
