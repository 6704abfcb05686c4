//! Relational persistence for the PKD.
//!
//! The store is the authoritative side of the system: the LDAP directory
//! is repaired from it, never the other way around. Every statement routes
//! through the [`Dialect`] helpers and the [`QueryExecutor`] seam so the
//! repositories stay backend-agnostic; all values are bound parameters,
//! never concatenated.

mod audit;
mod certificate;
mod crl;
mod dialect;
mod executor;
mod icao;
mod recon;
mod schema;
mod sqlite;
mod sync;
mod verification;

pub use self::{
    audit::{AuditLogStore, AuditRecord},
    certificate::{
        CertificateRecord, CertificateStore, NewCertificate, PutOutcome, SightingMeta,
        ValidationOutcomeRow,
    },
    crl::{CrlRecord, CrlStore, NewCrl},
    dialect::Dialect,
    executor::{QueryExecutor, Row, SqlValue},
    icao::{IcaoVersion, IcaoVersionStatus, IcaoVersionStore, RevalidationRun},
    recon::{ReconOpRow, ReconciliationStore, ReconciliationSummaryRow},
    schema::create_schema,
    sqlite::SqliteExecutor,
    sync::{SyncConfig, SyncConfigStore, SyncStatusRecord, SyncStatusStore, TypeCounts},
    verification::{DataGroupRow, PaVerificationRecord, VerificationStore},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database connection pool exhausted")]
    PoolExhausted,

    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("row mapping failed: {0}")]
    Mapping(String),
}

/// Certificate classification in the store and the directory tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CertType {
    Csca,
    Dsc,
    DscNc,
    Mlsc,
}

impl CertType {
    pub const ALL: [Self; 4] = [Self::Csca, Self::Dsc, Self::DscNc, Self::Mlsc];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csca => "CSCA",
            Self::Dsc => "DSC",
            Self::DscNc => "DSC_NC",
            Self::Mlsc => "MLSC",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "CSCA" => Self::Csca,
            "DSC" => Self::Dsc,
            "DSC_NC" => Self::DscNc,
            "MLSC" => Self::Mlsc,
            _ => return None,
        })
    }

    /// CSCAs and MLSCs carry their country in the subject; document
    /// signers inherit it from the issuer.
    pub fn is_self_issued_kind(self) -> bool {
        matches!(self, Self::Csca | Self::Mlsc)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceType {
    Upload,
    PaExtracted,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "UPLOAD",
            Self::PaExtracted => "PA_EXTRACTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "UPLOAD" => Self::Upload,
            "PA_EXTRACTED" => Self::PaExtracted,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Conformance {
    #[default]
    Conformant,
    NonConformant,
}

impl Conformance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conformant => "CONFORMANT",
            Self::NonConformant => "NON_CONFORMANT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "CONFORMANT" => Self::Conformant,
            "NON_CONFORMANT" => Self::NonConformant,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidationStatus {
    #[default]
    Unknown,
    Valid,
    Expired,
    NotYetValid,
    Invalid,
    Error,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Valid => "VALID",
            Self::Expired => "EXPIRED",
            Self::NotYetValid => "NOT_YET_VALID",
            Self::Invalid => "INVALID",
            Self::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "UNKNOWN" => Self::Unknown,
            "VALID" => Self::Valid,
            "EXPIRED" => Self::Expired,
            "NOT_YET_VALID" => Self::NotYetValid,
            "INVALID" => Self::Invalid,
            "ERROR" => Self::Error,
            _ => return None,
        })
    }
}

/// CRL revocation verdict recorded per certificate revalidation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RevocationStatus {
    Good,
    Revoked,
    #[default]
    Unknown,
}

impl RevocationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "GOOD",
            Self::Revoked => "REVOKED",
            Self::Unknown => "UNKNOWN",
        }
    }
}
