use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task with id {0} not found")]
    NotFound(i64),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("task store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("task store file is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0} is not supported by the task store")]
    Unsupported(&'static str),

    #[error("{0}")]
    Collaborator(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("invalid arguments for {channel}: {reason}")]
    InvalidArguments { channel: String, reason: String },

    #[error("unexpected response for {0}")]
    UnexpectedResponse(&'static str),

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CommandError {
    pub fn collaborator(err: impl std::fmt::Display) -> Self {
        Self::Collaborator(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to bind proxy on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type CommandResult<T> = Result<T, CommandError>;
