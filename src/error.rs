use crate::domain::batch::BatchError;
use crate::domain::config::ValidationReport;
use crate::domain::job::BatchInputError;
use crate::domain::tts::ProviderError;
use crate::infrastructure::config::ConfigError;
use std::path::PathBuf;

/// Main application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid provider configuration:\n{0}")]
    InvalidConfiguration(ValidationReport),

    #[error("Invalid batch input: {0}")]
    Input(#[from] BatchInputError),

    #[error("Batch refused: {0}")]
    Batch(BatchError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<BatchError> for AppError {
    fn from(error: BatchError) -> Self {
        match error {
            BatchError::InvalidConfig(report) => AppError::InvalidConfiguration(report),
            BatchError::Provider(e) => AppError::Provider(e),
            other => AppError::Batch(other),
        }
    }
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidConfiguration(_) => 78,
            Self::Input(_) | Self::Batch(_) => 65,
            Self::Provider(_) => 69,
            Self::Io { .. } => 74,
        }
    }
}

/// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;
