use dascat_protocol::ProtocolError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConcatError>;

#[derive(Error, Debug)]
pub enum ConcatError {
    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Cannot append packet: {0}")]
    Append(#[from] ProtocolError),
}
