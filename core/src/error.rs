use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Malformed boot sector: {0}")]
    MalformedBootSector(String),

    #[error("Invalid path segment: {0}")]
    InvalidPathSegment(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt cluster chain: {0}")]
    CorruptChain(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl BridgeError {
    /// True for outcomes that mean "no such entry" rather than a volume or I/O fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BridgeError::NotFound(_) | BridgeError::InvalidPathSegment(_))
    }
}
