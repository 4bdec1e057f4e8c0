use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure taxonomy shared by every manual operation.
///
/// Expected conditions (a missing sidecar, a taken filename) are variants here rather than
/// panics or opaque strings so callers can pick the message tone: a missing sidecar is usually
/// silent, a corrupt one is worth a warning, a collision is shown to the user verbatim.
#[derive(Debug, Error)]
pub enum Error {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(
        "a file named \"{name}\" already exists in this directory; choose a different title or rename the existing file"
    )]
    Collision { name: String, path: PathBuf },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed metadata JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid suggestion type: {0}")]
    InvalidSuggestionType(String),
}

impl Error {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Problems with user input, detected before any file is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Title is a required field.")]
    EmptyTitle,

    #[error(transparent)]
    YearRange(#[from] YearRangeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum YearRangeError {
    #[error("Invalid year range \"{0}\". Use the format YYYY-YYYY, e.g. 1998-2005.")]
    Format(String),

    #[error("Invalid year range: start year {start} is after end year {end}.")]
    Reversed { start: i32, end: i32 },

    #[error("Invalid year range: years must be between {min} and {max}.")]
    OutOfBounds { min: i32, max: i32 },
}
