//! Certificate Revocation List decoding and revocation lookup.

use {
    super::{dn::DnComponents, verify, CertError},
    chrono::{DateTime, TimeZone, Utc},
    der::Decode,
    sha2::{Digest, Sha256},
    x509_cert::{crl::CertificateList, spki::SubjectPublicKeyInfoOwned},
};

/// A parsed CRL plus the metadata the store and the chain validator need.
pub struct CrlInfo {
    crl:                    CertificateList,
    pub der:                Vec<u8>,
    pub fingerprint_sha256: String,
    pub issuer_dn:          String,
    pub issuer:             DnComponents,
    pub this_update:        DateTime<Utc>,
    pub next_update:        Option<DateTime<Utc>>,
}

fn time_to_utc(time: &x509_cert::time::Time) -> Result<DateTime<Utc>, CertError> {
    let unix = time.to_unix_duration();
    Utc.timestamp_opt(unix.as_secs() as i64, unix.subsec_nanos())
        .single()
        .ok_or(CertError::InvalidTime)
}

impl CrlInfo {
    pub fn from_der(der: &[u8]) -> Result<Self, CertError> {
        if der.is_empty() {
            return Err(CertError::Empty);
        }
        let crl = CertificateList::from_der(der)?;
        let tbs = &crl.tbs_cert_list;

        let issuer = DnComponents::from_name(&tbs.issuer);
        let this_update = time_to_utc(&tbs.this_update)?;
        let next_update = tbs.next_update.as_ref().map(time_to_utc).transpose()?;

        Ok(Self {
            issuer_dn: tbs.issuer.to_string(),
            issuer,
            this_update,
            next_update,
            fingerprint_sha256: hex::encode(Sha256::digest(der)),
            der: der.to_vec(),
            crl,
        })
    }

    /// RFC 5280: a CRL past its nextUpdate cannot be relied upon.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.next_update.is_some_and(|next| now > next)
    }

    /// Look up a certificate serial number (hex, case-insensitive) in the
    /// revoked list.
    pub fn is_revoked(&self, serial_hex: &str) -> bool {
        let needle = serial_hex.to_ascii_uppercase();
        self.crl
            .tbs_cert_list
            .revoked_certificates
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|revoked| hex::encode_upper(revoked.serial_number.as_bytes()) == needle)
    }

    /// Number of revoked entries, for diagnostics.
    pub fn revoked_count(&self) -> usize {
        self.crl
            .tbs_cert_list
            .revoked_certificates
            .as_deref()
            .map_or(0, <[_]>::len)
    }

    /// Verify the CRL signature against the issuing CSCA's public key.
    pub fn verify_signature(&self, issuer_spki: &SubjectPublicKeyInfoOwned) -> bool {
        verify::verify_crl_signature(&self.crl, issuer_spki).unwrap_or(false)
    }
}
