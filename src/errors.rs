use thiserror::Error;

/// A live feed could not deliver snapshots.
///
/// Feeds stop after reporting one of these; re-subscribing is the caller's call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeedError {
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("feed transport failed for {path}: {message}")]
    Transport { path: String, message: String },

    #[error("store returned HTTP {status} for {path}")]
    Status { path: String, status: u16 },

    #[error("failed to decode document {path}: {message}")]
    Decode { path: String, message: String },

    #[error("feed fault on {path}: {message}")]
    Injected { path: String, message: String },
}

/// A write was rejected or never reached the store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WriteError {
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("permission denied writing {0}")]
    PermissionDenied(String),

    #[error("store rejected write to {path} with HTTP {status}: {message}")]
    Rejected {
        path: String,
        status: u16,
        message: String,
    },

    #[error("write transport failed for {path}: {message}")]
    Transport { path: String, message: String },

    #[error("failed to encode write for {path}: {message}")]
    Encode { path: String, message: String },
}
