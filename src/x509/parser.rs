//! Certificate format detection and metadata extraction.
//!
//! Supports PEM, raw DER and CMS/PKCS#7 SignedData containers (Master List
//! uploads arrive as the latter). All metadata needed by the store is
//! extracted in one pass so that the parsed object never has to leave this
//! module.

use {
    super::{dn::DnComponents, CertError},
    crate::asn1::oids,
    chrono::{DateTime, TimeZone, Utc},
    cms::{cert::CertificateChoices, content_info::ContentInfo, signed_data::SignedData},
    der::{Decode, Encode},
    rsa::{pkcs1::DecodeRsaPublicKey, traits::PublicKeyParts},
    sha2::{Digest, Sha256},
    x509_cert::Certificate,
};

const PEM_MARKER: &[u8] = b"-----BEGIN CERTIFICATE-----";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CertificateFormat {
    Pem,
    Der,
    Cms,
    Unknown,
}

/// Detect the container format of raw upload bytes.
///
/// CMS must be probed before DER: both start with a SEQUENCE tag.
pub fn detect_format(data: &[u8]) -> CertificateFormat {
    if data.starts_with(PEM_MARKER) {
        return CertificateFormat::Pem;
    }
    if data.first() == Some(&0x30) {
        if parse_cms_signed_data(data).is_ok() {
            return CertificateFormat::Cms;
        }
        return CertificateFormat::Der;
    }
    CertificateFormat::Unknown
}

fn parse_cms_signed_data(data: &[u8]) -> Result<SignedData, CertError> {
    let content_info = ContentInfo::from_der(data)?;
    if content_info.content_type != oids::ID_SIGNED_DATA {
        return Err(CertError::NotSignedData);
    }
    Ok(content_info.content.decode_as::<SignedData>()?)
}

/// Extract every certificate from the input as DER bytes, whatever the
/// container format.
pub fn extract_certificates(data: &[u8]) -> Result<Vec<Vec<u8>>, CertError> {
    if data.is_empty() {
        return Err(CertError::Empty);
    }
    match detect_format(data) {
        CertificateFormat::Pem => {
            use x509_cert::der::DecodePem;
            let cert = Certificate::from_pem(data)?;
            Ok(vec![cert.to_der()?])
        }
        CertificateFormat::Der => {
            let cert = Certificate::from_der(data)?;
            Ok(vec![cert.to_der()?])
        }
        CertificateFormat::Cms => {
            let signed_data = parse_cms_signed_data(data)?;
            let set = signed_data
                .certificates
                .ok_or(CertError::NoCertificates)?;
            let mut certs = Vec::new();
            for choice in set.0.iter() {
                if let CertificateChoices::Certificate(cert) = choice {
                    certs.push(cert.to_der()?);
                }
            }
            if certs.is_empty() {
                return Err(CertError::NoCertificates);
            }
            Ok(certs)
        }
        CertificateFormat::Unknown => Err(CertError::UnknownFormat),
    }
}

/// Where a certificate sits in its validity window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidityState {
    NotYetValid,
    Valid,
    Expired,
}

impl ValidityState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotYetValid => "NOT_YET_VALID",
            Self::Valid => "VALID",
            Self::Expired => "EXPIRED",
        }
    }
}

/// All certificate metadata the store and the chain validator need,
/// extracted in one parse.
#[derive(Clone, Debug)]
pub struct CertificateInfo {
    pub der:                  Vec<u8>,
    pub fingerprint_sha256:   String,
    pub subject_dn:           String,
    pub issuer_dn:            String,
    pub subject:              DnComponents,
    pub issuer:               DnComponents,
    pub serial_number:        String,
    pub not_before:           DateTime<Utc>,
    pub not_after:            DateTime<Utc>,
    pub signature_algorithm:  String,
    pub public_key_algorithm: String,
    pub public_key_bits:      u32,
    pub is_self_signed:       bool,
}

fn time_to_utc(time: &x509_cert::time::Time) -> Result<DateTime<Utc>, CertError> {
    let unix = time.to_unix_duration();
    Utc.timestamp_opt(unix.as_secs() as i64, unix.subsec_nanos())
        .single()
        .ok_or(CertError::InvalidTime)
}

impl CertificateInfo {
    /// Parse DER bytes and extract metadata.
    ///
    /// The fingerprint is the lowercase hex SHA-256 over exactly these DER
    /// bytes; it is the content address of the certificate everywhere in
    /// the system.
    pub fn from_der(der: &[u8]) -> Result<Self, CertError> {
        if der.is_empty() {
            return Err(CertError::Empty);
        }
        let cert = Certificate::from_der(der)?;
        let tbs = &cert.tbs_certificate;

        let subject = DnComponents::from_name(&tbs.subject);
        let issuer = DnComponents::from_name(&tbs.issuer);
        // Format-independent comparison, not raw string equality.
        let is_self_signed = subject.normalized() == issuer.normalized();

        let spki = &tbs.subject_public_key_info;
        let (public_key_algorithm, public_key_bits) = match spki.algorithm.oid {
            oids::ID_RSA_ENCRYPTION => {
                let bits = spki
                    .subject_public_key
                    .as_bytes()
                    .and_then(|bytes| rsa::RsaPublicKey::from_pkcs1_der(bytes).ok())
                    .map_or(0, |key| key.n().bits() as u32);
                ("RSA".to_string(), bits)
            }
            oids::ID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .and_then(|p| p.decode_as::<der::asn1::ObjectIdentifier>().ok());
                let bits = match curve {
                    Some(oids::ID_NIST_P256) => 256,
                    Some(oids::ID_NIST_P384) => 384,
                    Some(oids::ID_NIST_P521) => 521,
                    _ => 0,
                };
                ("ECDSA".to_string(), bits)
            }
            other => (other.to_string(), 0),
        };

        Ok(Self {
            der: der.to_vec(),
            fingerprint_sha256: hex::encode(Sha256::digest(der)),
            subject_dn: tbs.subject.to_string(),
            issuer_dn: tbs.issuer.to_string(),
            subject,
            issuer,
            serial_number: hex::encode_upper(tbs.serial_number.as_bytes()),
            not_before: time_to_utc(&tbs.validity.not_before)?,
            not_after: time_to_utc(&tbs.validity.not_after)?,
            signature_algorithm: oids::signature_algorithm_label(&cert.signature_algorithm.oid),
            public_key_algorithm,
            public_key_bits,
            is_self_signed,
        })
    }

    pub fn validity_state(&self, now: DateTime<Utc>) -> ValidityState {
        if now < self.not_before {
            ValidityState::NotYetValid
        } else if now > self.not_after {
            ValidityState::Expired
        } else {
            ValidityState::Valid
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.not_after
    }

    /// Country attribution: CSCAs carry it in the subject, DSCs inherit it
    /// from the issuing CSCA.
    pub fn country_for_kind(&self, self_issued_kind: bool) -> Option<String> {
        let source = if self_issued_kind {
            &self.subject
        } else {
            &self.issuer
        };
        source
            .country
            .as_deref()
            .map(crate::country::normalize_to_alpha2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected() {
        assert_eq!(detect_format(b"\x77\x02\x01\x01"), CertificateFormat::Unknown);
        assert!(matches!(
            extract_certificates(b"garbage"),
            Err(CertError::UnknownFormat)
        ));
        assert!(matches!(extract_certificates(b""), Err(CertError::Empty)));
    }

    #[test]
    fn pem_marker_detected() {
        assert_eq!(
            detect_format(b"-----BEGIN CERTIFICATE-----\nMII..."),
            CertificateFormat::Pem
        );
    }
}
