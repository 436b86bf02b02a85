use thiserror::Error;

/// Failures surfaced by the session engine.
///
/// Every variant renders to the human-readable text shown to the operator;
/// the session keeps only the most recent one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),
    #[error("Configurations must define {0}")]
    MissingField(String),
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
    #[error("{0}")]
    ConfigParse(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{0}")]
    Protocol(String),
}

impl SessionError {
    pub fn validation(message: impl Into<String>) -> Self {
        SessionError::Validation(message.into())
    }

    pub fn missing(field: impl Into<String>) -> Self {
        SessionError::MissingField(field.into())
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
