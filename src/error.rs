use thiserror::Error;

#[derive(Error, Debug)]
pub enum DepsError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Collection failed: {0}")]
    Collection(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("Git push was not authorized: {0}")]
    PushAuthentication(String),

    #[error("Git host API error: {0}")]
    HostApi(String),

    #[error("Failed to restore the working tree: {0}")]
    Cleanup(String),

    #[error("{failed} of {total} updates failed")]
    UpdatesFailed { failed: usize, total: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl DepsError {
    /// Errors that leave nothing safe to continue with.
    ///
    /// Everything else raised while processing a single update is reported
    /// and the run moves on to the next update.
    pub fn aborts_run(&self) -> bool {
        matches!(
            self,
            DepsError::Configuration(_) | DepsError::Cleanup(_) | DepsError::UpdatesFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DepsError>;
