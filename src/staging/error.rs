use std::path::PathBuf;
use thiserror::Error;

/// Reading or writing an artifact location failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{location} not found")]
    NotFound { location: String },

    #[error("unsupported location {location}")]
    UnsupportedScheme { location: String },

    #[error("HTTP request for {location} failed: {message}")]
    Http { location: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Running the container tool failed.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("executable {name} not found on PATH: {source}")]
    ExecutableNotFound {
        name: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// A single asset could not be staged.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("invalid image reference {reference}: {reason}")]
    InvalidImageReference { reference: String, reason: String },

    #[error("no loaded image reported in output: {output}")]
    LoadedImageNotFound { output: String },

    #[error("scratch file {path}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
