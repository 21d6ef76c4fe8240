//! Error types for the delay manager's collaborators.
//!
//! None of these escape the manager's public API: the manager logs and
//! absorbs them per item.

use thiserror::Error;

/// Failure of a hide/reveal side effect for a single item.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("item {0} is not currently hidden")]
    NotHidden(String),

    #[error("item {0} is already hidden")]
    AlreadyHidden(String),

    #[error("item {0} is no longer attached to the feed")]
    Detached(String),

    #[error("presentation io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to attach to the live feed.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// The live feed container does not exist. Recoverable: the delay
    /// feature simply stays inactive.
    #[error("feed container not found: {0}")]
    ContainerNotFound(String),

    #[error("feed subscription failed: {0}")]
    SubscribeFailed(String),
}

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("preference io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed preference store: {0}")]
    Malformed(String),

    #[error("preference {key} holds a non-numeric value")]
    InvalidValue { key: String },

    #[error("{0} ms is not one of the offered delay choices")]
    NotAChoice(u64),
}
