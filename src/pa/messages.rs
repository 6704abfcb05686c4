//! Human-readable status messages for CRL and expiration outcomes.
//!
//! Every outcome carries a short code, an English description and a
//! detailed rationale referencing ICAO Doc 9303 Part 11 or RFC 5280, plus
//! a severity the UI layers map to colors and the audit trail stores
//! verbatim.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Code, one-line description and rationale for one verification aspect.
#[derive(Clone, Debug, Serialize)]
pub struct StatusMessage {
    pub code:        &'static str,
    pub description: &'static str,
    pub detail:      &'static str,
    pub severity:    Severity,
}

/// CRL check outcome per ICAO Doc 9303 Part 11.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum CrlStatus {
    Valid,
    Revoked,
    CrlUnavailable,
    CrlExpired,
    CrlInvalid,
    #[default]
    NotChecked,
}

impl CrlStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Revoked => "REVOKED",
            Self::CrlUnavailable => "CRL_UNAVAILABLE",
            Self::CrlExpired => "CRL_EXPIRED",
            Self::CrlInvalid => "CRL_INVALID",
            Self::NotChecked => "NOT_CHECKED",
        }
    }

    pub fn was_checked(self) -> bool {
        self != Self::NotChecked
    }

    pub fn message(self) -> StatusMessage {
        match self {
            Self::Valid => StatusMessage {
                code:        "VALID",
                description: "Certificate Revocation List (CRL) check passed",
                detail:      "The Document Signer Certificate (DSC) was verified against the \
                              Certificate Revocation List (CRL) as specified in ICAO Doc 9303 \
                              Part 11. The certificate is not revoked and remains valid for \
                              Passive Authentication.",
                severity:    Severity::Info,
            },
            Self::Revoked => StatusMessage {
                code:        "REVOKED",
                description: "Certificate has been revoked by issuing authority",
                detail:      "The Document Signer Certificate (DSC) appears on the Certificate \
                              Revocation List (CRL) published by the issuing Country Signing CA \
                              (CSCA). According to RFC 5280 and ICAO Doc 9303 Part 11, this \
                              certificate must not be used for Passive Authentication \
                              verification.",
                severity:    Severity::Critical,
            },
            Self::CrlUnavailable => StatusMessage {
                code:        "CRL_UNAVAILABLE",
                description: "Certificate Revocation List (CRL) not available",
                detail:      "No CRL was found in the LDAP PKD for this issuing country. ICAO \
                              Doc 9303 Part 11 specifies CRL checking as RECOMMENDED but not \
                              mandatory. Following the fail-open principle for unavailable \
                              infrastructure, verification continues with a warning.",
                severity:    Severity::Warning,
            },
            Self::CrlExpired => StatusMessage {
                code:        "CRL_EXPIRED",
                description: "Certificate Revocation List (CRL) has expired",
                detail:      "The CRL retrieved from the PKD has passed its nextUpdate time as \
                              defined in RFC 5280. An expired CRL cannot be relied upon for \
                              revocation status. ICAO Doc 9303 Part 11 recommends treating \
                              expired CRLs with caution, as they may not reflect recent \
                              revocations.",
                severity:    Severity::Warning,
            },
            Self::CrlInvalid => StatusMessage {
                code:        "CRL_INVALID",
                description: "Certificate Revocation List (CRL) signature verification failed",
                detail:      "The digital signature on the CRL could not be verified against \
                              the issuing CSCA's public key. This indicates either CRL \
                              corruption or a security compromise. Per RFC 5280 Section 6.3, \
                              an invalid CRL must not be used for certificate validation.",
                severity:    Severity::Critical,
            },
            Self::NotChecked => StatusMessage {
                code:        "NOT_CHECKED",
                description: "Certificate revocation check was not performed",
                detail:      "CRL checking was skipped or could not be completed. ICAO Doc \
                              9303 Part 11 considers CRL verification a SHOULD requirement \
                              rather than MUST; this is acceptable where CRL infrastructure is \
                              not fully deployed.",
                severity:    Severity::Info,
            },
        }
    }
}

/// Certificate expiration outcome relative to now, distinct from
/// point-in-time trust at the document's signing moment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ExpirationStatus {
    #[default]
    Valid,
    Warning,
    Expired,
}

impl ExpirationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Warning => "WARNING",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn message(self) -> StatusMessage {
        match self {
            Self::Valid => StatusMessage {
                code:        "VALID",
                description: "Certificates are within their validity periods",
                detail:      "Both the DSC and the binding CSCA are currently within their \
                              notBefore/notAfter windows per RFC 5280 section 4.1.2.5.",
                severity:    Severity::Info,
            },
            Self::Warning => StatusMessage {
                code:        "WARNING",
                description: "Certificate validity is degrading",
                detail:      "The CSCA has expired while the DSC remains valid, or the DSC is \
                              within 90 days of expiry. ICAO Doc 9303 Part 11 permits \
                              continued use under point-in-time validation, but replacement \
                              material should be distributed.",
                severity:    Severity::Warning,
            },
            Self::Expired => StatusMessage {
                code:        "EXPIRED",
                description: "Document Signer Certificate has expired",
                detail:      "The DSC's notAfter is in the past. Under ICAO Doc 9303 Part 11 \
                              point-in-time validation the chain can still be trustworthy if \
                              the document was signed while the certificate was valid; the \
                              expiration is reported alongside the trust verdict.",
                severity:    Severity::Warning,
            },
        }
    }
}
