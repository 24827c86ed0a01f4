use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures of the persistence capability itself.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store didn't answer within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Bson(#[from] bson::ser::Error),
    #[error("stored value under '{key}' is malformed: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),
    #[error("invalid username or code")]
    InvalidCredentials,
    #[error("class starts in 3 hours or less and can't be cancelled anymore")]
    TooSoon,
    #[error("{0}")]
    Forbidden(String),
    #[error("user '{0}' doesn't exist")]
    UserNotFound(String),
    #[error("class '{0}' doesn't exist")]
    ClassNotFound(String),
    #[error("'{0}' is required")]
    MissingField(&'static str),
    #[error("invalid class schedule: {0}")]
    InvalidSchedule(String),
    #[error("concurrent updates to '{0}' kept conflicting")]
    Conflict(String),
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl SchedulingError {
    pub fn forbidden(detail: impl ToString) -> SchedulingError {
        SchedulingError::Forbidden(detail.to_string())
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    // External errors
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Cors(#[from] rocket_cors::Error),
}
