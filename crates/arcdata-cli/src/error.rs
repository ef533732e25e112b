use arcdata_core::CoreError;
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("scheduler runtime failed: {0}")]
    Runtime(String),
}

impl From<arcdata_core::ValidationError> for CliError {
    fn from(error: arcdata_core::ValidationError) -> Self {
        Self::Core(CoreError::Validation(error))
    }
}

impl From<arcdata_warehouse::WarehouseError> for CliError {
    fn from(error: arcdata_warehouse::WarehouseError) -> Self {
        Self::Core(CoreError::Storage(error))
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Core(CoreError::Validation(_)) | Self::Argument(_) => 2,
            Self::Core(CoreError::NotFound { .. }) => 3,
            Self::Core(CoreError::Provider { .. } | CoreError::Transport { .. }) => 4,
            Self::Core(CoreError::Storage(_)) => 5,
            Self::Core(CoreError::Configuration(_)) => 6,
            Self::Serialization(_) | Self::Csv(_) | Self::Io(_) | Self::Runtime(_) => 10,
        }
    }
}
