use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type returned by the annotation engine.
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// Reading or writing a model/schema file failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `annotation_position` was set to something other than top, bottom or schema_file.
    #[error("`annotation_position` is incorrect! Got `{got}`, expected one of {expected:?}")]
    InvalidPosition { got: String, expected: &'static [&'static str] },

    /// The host-supplied schema manifest could not be parsed.
    #[error("invalid schema manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The configured model directory is missing.
    #[error("model directory {0} does not exist")]
    MissingModelDir(PathBuf),
}

impl AnnotateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used across the engine.
pub type AnnotateResult<T> = Result<T, AnnotateError>;
