//! Store errors
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("STORE/io: {0}")]
    Io(#[from] std::io::Error),

    #[error("STORE/encode: {0}")]
    Encode(#[from] serde_json::Error),

    /// Stored value exists but is not valid JSON for its record type.
    #[error("STORE/corrupt record '{key}': {message}")]
    Corrupt { key: String, message: String },

    #[error("STORE/invalid key '{0}'")]
    InvalidKey(String),

    #[error("STORE/{0}")]
    Rejected(String),
}
