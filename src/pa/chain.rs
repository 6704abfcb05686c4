//! Certificate chain validation — the hot path of every PA run.
//!
//! Resolves candidate CSCAs through the [`TrustSource`] capability set,
//! binds the DSC to the first CSCA whose key verifies it, then applies
//! point-in-time validity and the CRL policy of ICAO Doc 9303 Part 11.

use {
    super::messages::{CrlStatus, ExpirationStatus},
    crate::{
        ldap::TrustSource,
        x509::{verify, CertificateInfo, CrlInfo},
    },
    chrono::{DateTime, Duration, Utc},
    serde::Serialize,
    tracing::{debug, info, warn},
};

/// DSCs this close to `notAfter` degrade the expiration status.
const EXPIRY_WARNING_WINDOW_DAYS: i64 = 90;

/// Full outcome of one chain validation.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ChainValidation {
    pub country_code: String,

    pub dsc_subject:       String,
    pub dsc_issuer:        String,
    pub dsc_serial_number: String,
    pub dsc_expired:       bool,

    pub csca_subject:       Option<String>,
    pub csca_serial_number: Option<String>,
    pub csca_fingerprint:   Option<String>,
    pub csca_expired:       bool,
    pub csca_found:         bool,

    pub signature_verified: bool,
    pub chain_valid:        bool,

    pub crl_status:  CrlStatus,
    pub crl_checked: bool,
    pub revoked:     bool,

    pub expiration_status:     ExpirationStatus,
    pub valid_at_signing_time: Option<bool>,

    pub trust_chain_path:  Option<String>,
    pub trust_chain_depth: u32,

    pub validation_errors: Option<String>,
}

pub struct ChainValidator {
    now: Option<DateTime<Utc>>,
}

impl Default for ChainValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainValidator {
    pub fn new() -> Self {
        Self { now: None }
    }

    /// Pin the evaluation clock (tests).
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Some(now) }
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// Validate `dsc` against the PKD material served by `source`.
    ///
    /// `country_code` falls back to the `C=` component of the DSC issuer
    /// DN. `signing_time` enables point-in-time validation; when absent,
    /// `valid_at_signing_time` stays `None` rather than being assumed.
    pub fn validate(
        &self,
        dsc: &CertificateInfo,
        country_code: Option<&str>,
        signing_time: Option<DateTime<Utc>>,
        source: &mut dyn TrustSource,
    ) -> ChainValidation {
        let now = self.now();
        let dsc_expired = dsc.is_expired(now);
        let mut result = ChainValidation {
            dsc_subject: dsc.subject_dn.clone(),
            dsc_issuer: dsc.issuer_dn.clone(),
            dsc_serial_number: dsc.serial_number.clone(),
            dsc_expired,
            expiration_status: if dsc_expired {
                ExpirationStatus::Expired
            } else {
                ExpirationStatus::Valid
            },
            ..ChainValidation::default()
        };

        let country = country_code
            .map(crate::country::normalize_to_alpha2)
            .filter(|c| !c.is_empty())
            .or_else(|| {
                dsc.issuer
                    .country
                    .as_deref()
                    .map(crate::country::normalize_to_alpha2)
            })
            .unwrap_or_default();
        if country.is_empty() {
            result.validation_errors =
                Some("no issuing country: not supplied and absent from DSC issuer DN".to_string());
            return result;
        }
        result.country_code.clone_from(&country);
        info!(%country, dsc = %result.dsc_subject, "validating certificate chain");

        // Candidate CSCAs: match by issuer DN first, widen to the whole
        // country on a miss (key rollover renames are common).
        let candidates = match source.find_cscas_by_issuer(&dsc.issuer_dn, &country) {
            Ok(matched) if !matched.is_empty() => matched,
            Ok(_) => match source.find_all_cscas_by_country(&country) {
                Ok(all) => all,
                Err(error) => {
                    result.validation_errors = Some(format!("CSCA lookup failed: {error}"));
                    return result;
                }
            },
            Err(error) => {
                result.validation_errors = Some(format!("CSCA lookup failed: {error}"));
                return result;
            }
        };
        if candidates.is_empty() {
            result.validation_errors =
                Some(format!("CSCA not found for issuer: {}", dsc.issuer_dn));
            return result;
        }

        // Every candidate whose key verifies the DSC signature binds the
        // chain; ties are broken by current validity, then latest
        // notBefore (link certificates / key rollover).
        let mut verifying: Vec<CertificateInfo> = Vec::new();
        for der in &candidates {
            let Ok(info) = CertificateInfo::from_der(der) else {
                warn!("skipping unparseable CSCA candidate");
                continue;
            };
            let Ok(spki) = verify::spki_of(der) else {
                continue;
            };
            match verify::verify_certificate_signature(&dsc.der, &spki) {
                Ok(true) => verifying.push(info),
                Ok(false) => debug!(csca = %info.subject_dn, "candidate key does not verify DSC"),
                Err(error) => warn!(%error, csca = %info.subject_dn, "cannot verify under candidate"),
            }
        }
        result.csca_found = true;
        let Some(csca) = pick_binding_csca(verifying, now) else {
            result.validation_errors = Some(format!(
                "DSC is not signed by any known CSCA for {country}"
            ));
            return result;
        };

        result.csca_subject = Some(csca.subject_dn.clone());
        result.csca_serial_number = Some(csca.serial_number.clone());
        result.csca_fingerprint = Some(csca.fingerprint_sha256.clone());
        result.csca_expired = csca.is_expired(now);
        result.signature_verified = true;

        // Point-in-time validity per ICAO 9303 Part 11: a chain stays
        // trustworthy if the certificate was valid at the signing moment,
        // even if expired now.
        result.valid_at_signing_time = signing_time
            .map(|at| dsc.not_before <= at && at <= dsc.not_after);
        result.expiration_status = if result.dsc_expired {
            ExpirationStatus::Expired
        } else if result.csca_expired
            || now + Duration::days(EXPIRY_WARNING_WINDOW_DAYS) > dsc.not_after
        {
            ExpirationStatus::Warning
        } else {
            ExpirationStatus::Valid
        };

        result.crl_status = self.check_crl(dsc, &csca, &country, now, source);
        result.crl_checked = result.crl_status.was_checked();
        result.revoked = result.crl_status == CrlStatus::Revoked;

        result.trust_chain_path = Some(format!(
            "DSC → {}",
            truncate(&csca.subject_dn, 50)
        ));
        result.trust_chain_depth = 2;

        // CRL unavailability fails open; only a revocation breaks trust.
        result.chain_valid = result.signature_verified && !result.revoked;
        result
    }

    fn check_crl(
        &self,
        dsc: &CertificateInfo,
        csca: &CertificateInfo,
        country: &str,
        now: DateTime<Utc>,
        source: &mut dyn TrustSource,
    ) -> CrlStatus {
        let crl_der = match source.find_crl_by_country(country) {
            Ok(Some(der)) => der,
            Ok(None) => return CrlStatus::CrlUnavailable,
            Err(error) => {
                warn!(%error, %country, "CRL lookup failed");
                return CrlStatus::CrlUnavailable;
            }
        };
        let crl = match CrlInfo::from_der(&crl_der) {
            Ok(crl) => crl,
            Err(error) => {
                warn!(%error, %country, "CRL does not parse");
                return CrlStatus::CrlInvalid;
            }
        };
        if crl.is_expired(now) {
            return CrlStatus::CrlExpired;
        }
        let issuer_spki = match verify::spki_of(&csca.der) {
            Ok(spki) => spki,
            Err(_) => return CrlStatus::CrlInvalid,
        };
        if !crl.verify_signature(&issuer_spki) {
            return CrlStatus::CrlInvalid;
        }
        if crl.is_revoked(&dsc.serial_number) {
            info!(serial = %dsc.serial_number, %country, "DSC is revoked");
            CrlStatus::Revoked
        } else {
            CrlStatus::Valid
        }
    }
}

/// Prefer the candidate currently within its validity window, then the
/// latest `notBefore`.
fn pick_binding_csca(
    mut verifying: Vec<CertificateInfo>,
    now: DateTime<Utc>,
) -> Option<CertificateInfo> {
    verifying.sort_by_key(|candidate| {
        let current = candidate.not_before <= now && now <= candidate.not_after;
        (std::cmp::Reverse(current), std::cmp::Reverse(candidate.not_before))
    });
    verifying.into_iter().next()
}

fn truncate(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
