//! Error types for the rig link

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Socket could not be created, bound or joined to its group
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid subject schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to spawn thread: {0}")]
    Thread(String),
}
