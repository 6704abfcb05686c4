//! Security Object (EF.SOD) parsing.
//!
//! A SOD arrives either as a bare CMS ContentInfo or wrapped in the ICAO
//! application-23 tag `0x77` (ICAO-9303-10 4.7.14). The wrapper is BER, so
//! it is stripped with an explicit bounds-checked TLV reader before the DER
//! decoder takes over.

use {
    super::oids,
    chrono::{DateTime, TimeZone, Utc},
    cms::{
        cert::CertificateChoices,
        content_info::{CmsVersion, ContentInfo},
        signed_data::{SignedData, SignerInfo},
    },
    der::{
        asn1::{GeneralizedTime, ObjectIdentifier as Oid, OctetString, PrintableString, UtcTime},
        Decode, Encode, Sequence,
    },
    thiserror::Error,
};

/// ICAO application class tag wrapping the SOD ContentInfo.
const ICAO_SOD_TAG: u8 = 0x77;

#[derive(Debug, Error)]
pub enum SodError {
    #[error("SOD data is empty")]
    Empty,

    #[error("unrecognized outer tag {0:#04x} (expected 0x77 wrapper or CMS SEQUENCE)")]
    UnrecognizedTag(u8),

    #[error("TLV length runs past the end of the buffer")]
    Truncated,

    #[error("indefinite length encoding is not allowed")]
    IndefiniteLength,

    #[error("length encoding exceeds 4 bytes")]
    OversizedLength,

    #[error("content type {0} is not id-signedData")]
    NotSignedData(Oid),

    #[error("SignedData must be version 3")]
    WrongVersion,

    #[error("SignedData must contain the certificates field")]
    MissingCertificates,

    #[error("SignedData must contain at least one SignerInfo")]
    MissingSignerInfo,

    #[error("SignedData has no encapsulated content")]
    MissingContent,

    #[error("encapsulated content type {0} is not an LDSSecurityObject")]
    WrongContentType(Oid),

    #[error(transparent)]
    Der(#[from] der::Error),
}

/// ICAO-9303-10 4.6.2.3
#[derive(Clone, Debug, PartialEq, Eq, Sequence)]
pub struct LdsSecurityObject {
    pub version:                u64,
    pub hash_algorithm:         cms::cert::x509::spki::AlgorithmIdentifierOwned,
    pub data_group_hash_values: Vec<DataGroupHash>,
    pub lds_version_info:       Option<LdsVersionInfo>,
}

/// ICAO-9303-10 4.6.2.3
#[derive(Clone, Debug, PartialEq, Eq, Sequence)]
pub struct LdsVersionInfo {
    pub lds_version:     PrintableString,
    pub unicode_version: PrintableString,
}

/// ICAO-9303-10 4.6.2.3
#[derive(Clone, Debug, PartialEq, Eq, Sequence)]
pub struct DataGroupHash {
    pub data_group_number: u64,
    pub hash_value:        OctetString,
}

impl LdsSecurityObject {
    /// Expected hash for a data group number, if listed.
    pub fn hash_for_dg(&self, dg_number: u8) -> Option<&[u8]> {
        self.data_group_hash_values
            .iter()
            .find(|entry| entry.data_group_number == u64::from(dg_number))
            .map(|entry| entry.hash_value.as_bytes())
    }

    /// Digest algorithm display name for the data group hashes.
    pub fn hash_algorithm_name(&self) -> &'static str {
        oids::digest_name(&self.hash_algorithm.oid).unwrap_or("SHA-256")
    }
}

/// A parsed Security Object: the CMS SignedData, its embedded
/// LDSSecurityObject and the DER of the signer certificate (DSC).
///
/// The DSC is handed out as DER bytes, not as a parsed object; each
/// consumer re-parses into its own value.
pub struct SecurityObject {
    signed_data: SignedData,
    econtent:    Vec<u8>,
    lds:         LdsSecurityObject,
    dsc_der:     Vec<u8>,
}

/// Read a BER length octet sequence, returning `(length, header_len)`.
///
/// Every advance is validated against the remaining buffer; indefinite and
/// overlong forms are hard errors. Also used by the DG1 MRZ scanner.
pub(crate) fn read_ber_length(buf: &[u8]) -> Result<(usize, usize), SodError> {
    let first = *buf.first().ok_or(SodError::Truncated)?;
    if first < 0x80 {
        return Ok((usize::from(first), 1));
    }
    if first == 0x80 {
        return Err(SodError::IndefiniteLength);
    }
    let count = usize::from(first & 0x7f);
    if count > 4 {
        return Err(SodError::OversizedLength);
    }
    if buf.len() < 1 + count {
        return Err(SodError::Truncated);
    }
    let mut length = 0usize;
    for &byte in &buf[1..1 + count] {
        length = (length << 8) | usize::from(byte);
    }
    Ok((length, 1 + count))
}

/// Strip the ICAO `0x77` application wrapper, yielding the inner
/// ContentInfo bytes.
fn strip_icao_wrapper(data: &[u8]) -> Result<&[u8], SodError> {
    let (length, header_len) = read_ber_length(&data[1..])?;
    let start = 1 + header_len;
    let end = start.checked_add(length).ok_or(SodError::OversizedLength)?;
    if end > data.len() {
        return Err(SodError::Truncated);
    }
    Ok(&data[start..end])
}

impl SecurityObject {
    /// Parse a SOD from raw bytes, accepting either the `0x77` wrapper or a
    /// bare CMS ContentInfo. Anything else is rejected.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SodError> {
        let first = *data.first().ok_or(SodError::Empty)?;
        let cms_bytes = match first {
            ICAO_SOD_TAG => strip_icao_wrapper(data)?,
            0x30 => data,
            other => return Err(SodError::UnrecognizedTag(other)),
        };

        let content_info = ContentInfo::from_der(cms_bytes)?;
        if content_info.content_type != oids::ID_SIGNED_DATA {
            return Err(SodError::NotSignedData(content_info.content_type));
        }
        let signed_data = content_info.content.decode_as::<SignedData>()?;

        // Structure checks per ICAO 9303-10 4.6.2.2
        if signed_data.version != CmsVersion::V3 {
            return Err(SodError::WrongVersion);
        }
        if signed_data.signer_infos.0.as_slice().is_empty() {
            return Err(SodError::MissingSignerInfo);
        }

        // The signer certificate is the first certificate of the set.
        let dsc_der = signed_data
            .certificates
            .as_ref()
            .and_then(|set| {
                set.0.as_slice().iter().find_map(|choice| match choice {
                    CertificateChoices::Certificate(cert) => Some(cert.to_der()),
                    _ => None,
                })
            })
            .ok_or(SodError::MissingCertificates)??;

        let econ = &signed_data.encap_content_info;
        if econ.econtent_type != oids::ID_LDS_SECURITY_OBJECT {
            return Err(SodError::WrongContentType(econ.econtent_type));
        }
        let octet_string = econ
            .econtent
            .as_ref()
            .ok_or(SodError::MissingContent)?
            .decode_as::<OctetString>()?;
        let econtent = octet_string.as_bytes().to_vec();
        let lds = LdsSecurityObject::from_der(&econtent)?;

        Ok(Self {
            signed_data,
            econtent,
            lds,
            dsc_der,
        })
    }

    pub fn signed_data(&self) -> &SignedData {
        &self.signed_data
    }

    pub fn signer_info(&self) -> &SignerInfo {
        self.signed_data
            .signer_infos
            .0
            .as_slice()
            .first()
            .expect("checked at parse time")
    }

    /// DER bytes of the signer certificate (DSC).
    pub fn dsc_der(&self) -> &[u8] {
        &self.dsc_der
    }

    /// Contents of the encapsulated OCTET STRING (the LDSSecurityObject
    /// DER), as covered by the messageDigest signed attribute.
    pub fn econtent_bytes(&self) -> &[u8] {
        &self.econtent
    }

    pub fn lds_security_object(&self) -> &LdsSecurityObject {
        &self.lds
    }

    /// Signer digest algorithm display name, defaulting to SHA-256 for
    /// unknown OIDs.
    pub fn digest_algorithm_name(&self) -> &'static str {
        oids::digest_name(&self.signer_info().digest_alg.oid).unwrap_or("SHA-256")
    }

    /// Signer signature algorithm display name (`SHA256withECDSA` style).
    pub fn signature_algorithm_name(&self) -> String {
        oids::signature_algorithm_label(&self.signer_info().signature_algorithm.oid)
    }

    /// RFC 5652 signing-time signed attribute, if present.
    pub fn signing_time(&self) -> Option<DateTime<Utc>> {
        let attrs = self.signer_info().signed_attrs.as_ref()?;
        let attr = attrs
            .iter()
            .find(|attr| attr.oid == oids::ID_SIGNING_TIME)?;
        let value = attr.values.as_slice().first()?;
        let unix = if let Ok(utc) = value.decode_as::<UtcTime>() {
            utc.to_unix_duration()
        } else if let Ok(gen) = value.decode_as::<GeneralizedTime>() {
            gen.to_unix_duration()
        } else {
            return None;
        };
        Utc.timestamp_opt(unix.as_secs() as i64, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ber_length_short_and_long_form() {
        assert_eq!(read_ber_length(&[0x23]).unwrap(), (0x23, 1));
        assert_eq!(read_ber_length(&[0x81, 0xff]).unwrap(), (255, 2));
        assert_eq!(read_ber_length(&[0x82, 0x01, 0x00]).unwrap(), (256, 3));
    }

    #[test]
    fn ber_length_rejects_bad_forms() {
        assert!(matches!(
            read_ber_length(&[0x80]),
            Err(SodError::IndefiniteLength)
        ));
        assert!(matches!(
            read_ber_length(&[0x85, 0, 0, 0, 0, 1]),
            Err(SodError::OversizedLength)
        ));
        assert!(matches!(read_ber_length(&[0x82, 0x01]), Err(SodError::Truncated)));
    }

    #[test]
    fn wrapper_length_must_fit_buffer() {
        // 0x77 wrapper claiming 0x10 bytes of content with only 2 present.
        let data = [0x77, 0x10, 0x30, 0x00];
        assert!(matches!(
            SecurityObject::from_bytes(&data),
            Err(SodError::Truncated)
        ));
    }

    #[test]
    fn rejects_foreign_outer_tag() {
        assert!(matches!(
            SecurityObject::from_bytes(&[0x6e, 0x00]),
            Err(SodError::UnrecognizedTag(0x6e))
        ));
        assert!(matches!(SecurityObject::from_bytes(&[]), Err(SodError::Empty)));
    }
}
