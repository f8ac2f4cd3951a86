//! Error taxonomy for registry operations.
//!
//! Every `RegistryError` is a terminal, locally detected validation or
//! authorization failure. The string returned by [`RegistryError::kind`] is a
//! stable identifier and part of the CLI output contract.

use crate::document::DocId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The referenced document has no record.
    #[error("document {0} not found")]
    DocumentNotFound(DocId),

    /// Not raised by any operation yet.
    #[error("document already exists")]
    DocumentAlreadyExists,

    /// Title or description length out of bounds.
    #[error("title or description length out of bounds")]
    InvalidTitle,

    /// File size is zero or at/above the cap.
    #[error("file size out of bounds")]
    InvalidDocumentSize,

    /// Caller lacks view access for a gated read.
    #[error("permission denied")]
    PermissionDenied,

    /// Caller is not the record's current owner.
    #[error("caller is not the document owner")]
    UnauthorizedOwner,

    /// Caller is not the administrator, or an owner tried to revoke themselves.
    #[error("action restricted to the administrator")]
    AdminOnlyAction,

    /// Not raised by any operation yet.
    #[error("viewing restricted")]
    ViewingRestricted,

    /// Tag count, tag length or combined capacity violated.
    #[error("tag validation failed")]
    TagValidationFailed,
}

impl RegistryError {
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::DocumentNotFound(_) => "DocumentNotFound",
            RegistryError::DocumentAlreadyExists => "DocumentAlreadyExists",
            RegistryError::InvalidTitle => "InvalidTitle",
            RegistryError::InvalidDocumentSize => "InvalidDocumentSize",
            RegistryError::PermissionDenied => "PermissionDenied",
            RegistryError::UnauthorizedOwner => "UnauthorizedOwner",
            RegistryError::AdminOnlyAction => "AdminOnlyAction",
            RegistryError::ViewingRestricted => "ViewingRestricted",
            RegistryError::TagValidationFailed => "TagValidationFailed",
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Failure of a journaled operation: either the registry rejected it, or the
/// log could not be written.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error(transparent)]
    Rejected(#[from] RegistryError),

    #[error("journal storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl JournalError {
    /// The registry rejection, if that is what this is.
    pub fn rejection(&self) -> Option<&RegistryError> {
        match self {
            JournalError::Rejected(e) => Some(e),
            JournalError::Storage(_) => None,
        }
    }
}
