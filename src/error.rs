use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A metric name has no entry in the unit registry.
    #[error("no unit registered for metric '{0}'")]
    UnknownUnit(String),

    /// A value could not be coerced, a log was malformed, or the engine
    /// itself reported a failure.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid tables: {0}")]
    InvalidTables(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
