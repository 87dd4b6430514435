use std::path::PathBuf;
use thiserror::Error;

/// The main error type for wider2voc operations.
#[derive(Debug, Error)]
pub enum WiderError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse MAT file {path}: {message}")]
    MatParse { path: PathBuf, message: String },

    #[error("Malformed split table in {path}: {message}")]
    SplitTable { path: PathBuf, message: String },

    #[error("Failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write annotation {path}: {source}")]
    AnnotationWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy image {from} to {to}: {source}")]
    ImageCopy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Conversion finished with {failed} failed image(s)")]
    ConversionIncomplete { failed: usize },

    #[error("Failed to serialize report: {0}")]
    ReportJson(#[from] serde_json::Error),
}

impl WiderError {
    /// Wrap an I/O error with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WiderError::Io {
            path: path.into(),
            source,
        }
    }
}
