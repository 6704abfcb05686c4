//! Crate-level error type.
//!
//! Subsystems carry their own `thiserror` enums; this is the aggregate the
//! binary and the schedulers observe. Inside the PA engine errors do not
//! short-circuit the verification: they are captured as structured fields on
//! the persisted record and surface only as the overall status.

use {
    crate::{ldap::DirectoryError, store::StoreError, x509::CertError},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("certificate not found: {0}")]
    CertNotFound(String),

    #[error("CRL not found for country {0}")]
    CrlNotFound(String),

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("certificate is revoked (serial {0})")]
    Revoked(String),

    #[error("missing configuration: {0}")]
    ConfigMissing(String),

    #[error("operation timed out after {0:?}")]
    OperationTimeout(std::time::Duration),
}

impl From<CertError> for Error {
    fn from(e: CertError) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<der::Error> for Error {
    fn from(e: der::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
