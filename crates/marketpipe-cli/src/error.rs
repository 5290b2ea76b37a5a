use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] marketpipe_core::ValidationError),

    #[error("strict mode failed: warnings={warning_count}, failures={failure_count}")]
    StrictModeViolation {
        warning_count: usize,
        failure_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<marketpipe_core::CoreError> for CliError {
    fn from(error: marketpipe_core::CoreError) -> Self {
        match error {
            marketpipe_core::CoreError::Validation(error) => Self::Validation(error),
            marketpipe_core::CoreError::Serialization(error) => Self::Serialization(error),
            marketpipe_core::CoreError::Io(error) => Self::Io(error),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::StrictModeViolation { .. } => 5,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
