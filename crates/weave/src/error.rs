use thiserror::Error;
use weave_session::{PreferencesError, SessionError};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid recording at line {line}: {source}")]
    Recording {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid session id '{0}'")]
    SessionId(String),

    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to serialize preferences: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Preferences(#[from] PreferencesError),
}
