use snafu::Snafu;
use std::io;
use std::path::PathBuf;

/// Possible errors from configuration document operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Path '{}' has invalid format: {}", path, msg))]
    InvalidPath { path: String, msg: String },

    #[snafu(display("Nothing found at '{}'", path))]
    NotFound { path: String },

    #[snafu(display("Element at '{}' has children, so it has no value to set", path))]
    NotLeaf { path: String },

    #[snafu(display("Parent path '{}' matched {} elements, expected exactly one", path, count))]
    AmbiguousParent { path: String, count: usize },

    #[snafu(display("Counter at '{}' has non-numeric value '{}'", path, value))]
    InvalidCounter { path: String, value: String },

    #[snafu(display("Counter at '{}' cannot be incremented past {}", path, value))]
    CounterOverflow { path: String, value: u64 },

    #[snafu(display("Failed to read configuration document '{}': {}", path.display(), source))]
    DocumentRead { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to parse configuration document: {}", source))]
    XmlParse { source: quick_xml::Error },

    #[snafu(display("Invalid attribute in configuration document: {}", source))]
    XmlAttribute {
        source: quick_xml::events::attributes::AttrError,
    },

    #[snafu(display("Configuration document is malformed: {}", msg))]
    Malformed { msg: String },

    #[snafu(display("Failed to serialize configuration document: {}", source))]
    XmlWrite { source: quick_xml::Error },

    #[snafu(display("Serialized configuration document is not UTF-8: {}", source))]
    XmlEncoding { source: std::string::FromUtf8Error },

    #[snafu(display("Failed to create temporary file in '{}': {}", dir.display(), source))]
    CreateTempfile { dir: PathBuf, source: io::Error },

    #[snafu(display("Failed to write temporary document for '{}': {}", path.display(), source))]
    TempfileWrite { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to copy permissions onto new '{}': {}", path.display(), source))]
    CopyPermissions { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to replace configuration document '{}': {}", path.display(), source))]
    PersistDocument {
        path: PathBuf,
        source: tempfile::PersistError,
    },
}

impl Error {
    /// Whether the error only means the addressed element doesn't exist, as opposed to a
    /// structural problem with the path or document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
