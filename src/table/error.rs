//! Error types for table providers.

use std::path::PathBuf;

use thiserror::Error;

/// A table could not be read. Every variant is fatal for that one source only.
#[derive(Debug, Error)]
pub enum TableError {
    /// The file could not be opened.
    #[error("cannot open {path}: {source}")]
    Open {
        /// Path of the source file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The container is not a readable zip archive.
    #[error("{path} is not a readable workbook: {source}")]
    Archive {
        /// Path of the source file.
        path: PathBuf,
        /// The underlying archive error.
        #[source]
        source: zip::result::ZipError,
    },

    /// A required workbook part is missing.
    #[error("{path} has no part named {part}")]
    MissingPart {
        /// Path of the source file.
        path: PathBuf,
        /// Name of the missing part inside the archive.
        part: String,
    },

    /// A workbook part contains invalid XML.
    #[error("invalid XML in {part} of {path}: {source}")]
    Xml {
        /// Path of the source file.
        path: PathBuf,
        /// Name of the part inside the archive.
        part: String,
        /// The underlying parser error.
        #[source]
        source: quick_xml::Error,
    },

    /// The workbook structure is inconsistent.
    #[error("malformed workbook {path}: {reason}")]
    Malformed {
        /// Path of the source file.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },
}

impl TableError {
    /// Creates an open error.
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    /// Creates an archive error.
    pub fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    /// Creates a missing-part error.
    pub fn missing_part(path: impl Into<PathBuf>, part: impl Into<String>) -> Self {
        Self::MissingPart {
            path: path.into(),
            part: part.into(),
        }
    }

    /// Creates an XML error.
    pub fn xml(path: impl Into<PathBuf>, part: impl Into<String>, source: quick_xml::Error) -> Self {
        Self::Xml {
            path: path.into(),
            part: part.into(),
            source,
        }
    }

    /// Creates a malformed-workbook error.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
