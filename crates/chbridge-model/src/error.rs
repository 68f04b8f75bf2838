use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown transfer type: {0}")]
    UnknownTransferType(String),
    #[error("unknown endpoint: {0} (expected clickhouse or flatfile)")]
    UnknownEndpoint(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
