//! X.509 certificate handling: format detection, metadata extraction, DN
//! components and signature verification.
//!
//! Parsed certificates have no shared ownership: every flow parses DER into
//! its own value and drops it when done. APIs that cross a subsystem
//! boundary exchange DER bytes, never parsed objects.

mod crl;
mod dn;
mod parser;
pub mod verify;

pub use self::{
    crl::CrlInfo,
    dn::{normalize_dn, DnComponents},
    parser::{
        detect_format, extract_certificates, CertificateFormat, CertificateInfo, ValidityState,
    },
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertError {
    #[error("certificate data is empty")]
    Empty,

    #[error("unrecognized certificate format")]
    UnknownFormat,

    #[error("not a CMS SignedData container")]
    NotSignedData,

    #[error("CMS container holds no certificates")]
    NoCertificates,

    #[error("invalid validity time")]
    InvalidTime,

    #[error(transparent)]
    Der(#[from] der::Error),
}
