// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the in-memory filesystem

use std::io;

/// Core filesystem error type
#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("'{0}' not found!")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("'{0}' is not a directory!")]
    NotADirectory(String),
    #[error("'{0}' is not a file!")]
    NotAFile(String),
    // The path is deliberately absent from the message.
    #[error("Permission denied!")]
    PermissionDenied,
    #[error("{0}")]
    ResourceBusy(String),
    #[error("Directory '{0}' is not empty!")]
    DirectoryNotEmpty(String),
    #[error("stream closed: {0}")]
    StreamClosed(String),
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(path: impl std::fmt::Display) -> Self {
        Self::NotFound(path.to_string())
    }

    pub fn busy(path: impl std::fmt::Display) -> Self {
        Self::ResourceBusy(format!("Delete failed, resource is in use: {path}"))
    }

    pub fn already_open(path: impl std::fmt::Display) -> Self {
        Self::ResourceBusy(format!("File already open: {path}"))
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    /// Map to the closest `std::io::ErrorKind`
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            FsError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            FsError::NotFound(_) => io::ErrorKind::NotFound,
            FsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            FsError::PermissionDenied => io::ErrorKind::PermissionDenied,
            FsError::Io(err) => err.kind(),
            _ => io::ErrorKind::Other,
        }
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        match err {
            FsError::Io(inner) => inner,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}
