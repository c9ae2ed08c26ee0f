use thiserror::Error;

use crate::domain::poll::PollError;
use crate::domain::task::registry::RegistryError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Inventory refresh failed for node {node}: {reason}")]
    InventoryRefresh { node: String, reason: String },
}

/// Errors raised by the HTTP clients of the external systems.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The remote resource is locked or busy. Callers retry these inside a poll.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),

    /// The remote system reports a state it cannot recover from on its own.
    #[error("remote entered a broken state: {0}")]
    BrokenState(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Poll(#[from] PollError),
}

pub type Result<T> = std::result::Result<T, Error>;
