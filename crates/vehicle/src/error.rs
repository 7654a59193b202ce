use carlink_auth::AuthError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid snapshot pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Invalid file name pattern '{0}'")]
    FileNamePattern(String),
}

impl VehicleError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VehicleError::File {
            path: path.into(),
            source,
        }
    }
}

pub type VehicleResult<T> = Result<T, VehicleError>;
