use crate::cfn_yaml::types::Location;
use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot read {}: {source}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Parse error in {}{}: {reason}", .path.display(), at(.location))]
    Parse {
        path: PathBuf,
        location: Option<Location>,
        reason: String,
    },

    #[error("Missing {path} in template")]
    MissingPath { path: String },

    #[error("Cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Problems found while converting parsed YAML into template nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum InternalError {
    InvalidKeyType(String),
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalError::InvalidKeyType(kind) => {
                write!(f, "mapping key must be a plain scalar, found {}", kind)
            }
        }
    }
}

fn at(location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!(" at {}", loc),
        None => String::new(),
    }
}

impl Error {
    pub fn missing_path(segments: &[&str]) -> Self {
        Error::MissingPath {
            path: segments.join("."),
        }
    }

    /// Fills in the file name for errors raised while the source was still
    /// an in-memory string.
    pub(crate) fn with_path(self, file: &std::path::Path) -> Self {
        match self {
            Error::Parse {
                location, reason, ..
            } => Error::Parse {
                path: file.to_path_buf(),
                location,
                reason,
            },
            other => other,
        }
    }
}
