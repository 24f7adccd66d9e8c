//! Error types for the shared data model and container codec.

use thiserror::Error;

/// Protocol result type.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while building matrices or reading/writing containers.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Matrix dimensions do not match the supplied data
    #[error("Shape error: {0}")]
    Shape(String),

    /// A required attribute is absent
    #[error("Missing attribute: {0}")]
    MissingAttribute(String),

    /// An attribute is present but unusable
    #[error("Invalid attribute '{key}': {reason}")]
    InvalidAttribute { key: String, reason: String },

    /// The container has no `data_down` dataset
    #[error("Missing dataset: {0}")]
    MissingDataset(String),

    #[error("HDF5 error: {0}")]
    Hdf5(String),

}

impl From<hdf5::Error> for ProtocolError {
    fn from(err: hdf5::Error) -> Self {
        Self::Hdf5(err.to_string())
    }
}

impl ProtocolError {
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    pub fn invalid_attribute(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
