use thiserror::Error;

/// Main error type for the pick'em engine
#[derive(Error, Debug)]
pub enum PickemError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Data source errors
    #[error("Data source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Invalid source data: {0}")]
    InvalidSourceData(String),

    // Job scheduling errors
    #[error("Scheduling error: {0}")]
    Scheduling(String),

    // Domain errors
    #[error("Domain invariant violated: {0}")]
    DomainInvariant(String),

    // Notification errors
    #[error("Notification error: {0}")]
    Notification(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl PickemError {
    /// Errors worth retrying against the data source: transport failures
    /// and the transient server statuses the source emits during
    /// maintenance windows.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PickemError::Http(_) | PickemError::SourceUnavailable(_)
        )
    }
}

/// Result type alias for PickemError
pub type Result<T> = std::result::Result<T, PickemError>;
