use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("no backend available")]
    NoBackend,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("experiment stopped before it was started")]
    StopBeforeStart,

    #[error("persistence failed: {0}")]
    Sink(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
