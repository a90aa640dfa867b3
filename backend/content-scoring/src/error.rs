use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoringError>;

/// Run-level failures. Per-item problems are reported as
/// [`ItemFailure`](crate::models::ItemFailure) values instead.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scoring task failed: {0}")]
    Task(String),
}

impl From<envy::Error> for ScoringError {
    fn from(err: envy::Error) -> Self {
        ScoringError::InvalidConfig(err.to_string())
    }
}
