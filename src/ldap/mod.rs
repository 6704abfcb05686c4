//! LDAP directory gateway.
//!
//! The directory mirrors the ICAO PKD layout: conformant material under
//! `dc=data,<base>`, non-conformant under `dc=nc-data,<base>`, then
//! `c=<CC>` per country and `o=<kind>` per certificate kind, with leaf
//! entries named by SHA-256 fingerprint. The gateway owns DN construction,
//! idempotent entry creation and conformance-aware search; connections come
//! from a fixed pool with scoped checkout.

mod gateway;
mod pool;
mod provider;

pub use self::{
    gateway::{DirectoryCounts, DirectoryGateway, DirectorySession, DscConformance},
    pool::{LdapHandle, LdapPool},
    provider::{MemoryTrustSource, TrustSource},
};
use {crate::store::CertType, thiserror::Error};

/// LDAP result codes this crate branches on.
pub(crate) const RC_NO_SUCH_OBJECT: u32 = 32;
pub(crate) const RC_ALREADY_EXISTS: u32 = 68;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("LDAP unreachable: {0}")]
    Unreachable(String),

    #[error("LDAP schema error: {0}")]
    Schema(String),

    #[error("LDAP connection pool exhausted")]
    PoolExhausted,

    #[error("LDAP operation failed (rc {rc}): {text}")]
    Operation { rc: u32, text: String },
}

impl From<ldap3::LdapError> for DirectoryError {
    fn from(e: ldap3::LdapError) -> Self {
        match e {
            ldap3::LdapError::LdapResult { result } => Self::Operation {
                rc:   result.rc,
                text: result.text,
            },
            other => Self::Unreachable(other.to_string()),
        }
    }
}

/// Organizational branch under a country node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LdapKind {
    Csca,
    /// Link certificates: CSCAs re-issued under a predecessor key. Counted
    /// as CSCA everywhere.
    Lc,
    Dsc,
    Crl,
    Mlsc,
}

impl LdapKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csca => "csca",
            Self::Lc => "lc",
            Self::Dsc => "dsc",
            Self::Crl => "crl",
            Self::Mlsc => "mlsc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "csca" => Self::Csca,
            "lc" => Self::Lc,
            "dsc" => Self::Dsc,
            "crl" => Self::Crl,
            "mlsc" => Self::Mlsc,
            _ => return None,
        })
    }

    /// The branch a certificate type publishes into. `DSC_NC` shares the
    /// `o=dsc` branch; the container (`dc=nc-data`) distinguishes it.
    pub fn for_cert_type(cert_type: CertType) -> Self {
        match cert_type {
            CertType::Csca => Self::Csca,
            CertType::Dsc | CertType::DscNc => Self::Dsc,
            CertType::Mlsc => Self::Mlsc,
        }
    }
}
