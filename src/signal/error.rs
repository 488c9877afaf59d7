use thiserror::Error;
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("malformed wav container: {0}")]
    MalformedContainer(String),
    #[error("signal source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}
