//! Test PKI: a generated CSCA/DSC pair, CRLs and hand-assembled SODs.
//!
//! Everything is ECDSA P-256 with SHA-256, the most common profile in the
//! live PKD.
#![allow(dead_code)]

use {
    anyhow::Result,
    cms::{
        cert::{x509::Certificate, CertificateChoices, IssuerAndSerialNumber},
        content_info::{CmsVersion, ContentInfo},
        signed_data::{
            CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo,
            SignerInfos,
        },
    },
    der::{
        asn1::{ObjectIdentifier as Oid, OctetString, SetOfVec},
        Any, Decode, Encode,
    },
    icao_local_pkd::asn1::{DataGroupHash, LdsSecurityObject},
    p256::{ecdsa::SigningKey, pkcs8::DecodePrivateKey},
    rcgen::{
        BasicConstraints, CertificateParams, CertificateRevocationListParams, DistinguishedName,
        DnType, IsCa, Issuer, KeyIdMethod, KeyPair, KeyUsagePurpose, RevocationReason,
        RevokedCertParams, SerialNumber,
    },
    sha2::{Digest, Sha256},
    time::{Duration, OffsetDateTime},
    x509_cert::{attr::Attribute, spki::AlgorithmIdentifierOwned},
};

const ID_SIGNED_DATA: Oid = Oid::new_unwrap("1.2.840.113549.1.7.2");
const ID_LDS_SECURITY_OBJECT: Oid = Oid::new_unwrap("2.23.136.1.1.1");
const ID_CONTENT_TYPE: Oid = Oid::new_unwrap("1.2.840.113549.1.9.3");
const ID_MESSAGE_DIGEST: Oid = Oid::new_unwrap("1.2.840.113549.1.9.4");
const ID_SHA256: Oid = Oid::new_unwrap("2.16.840.1.101.3.4.2.1");
const ID_ECDSA_WITH_SHA256: Oid = Oid::new_unwrap("1.2.840.10045.4.3.2");

/// A complete issuing hierarchy for one country.
pub struct TestPki {
    pub country:  &'static str,
    pub csca_der: Vec<u8>,
    pub dsc_der:  Vec<u8>,
    pub dsc_key:  SigningKey,
    csca_params:  CertificateParams,
    csca_key:     KeyPair,
    dsc_serial:   u64,
}

fn csca_params(country: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::new()).expect("empty SANs");
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CountryName, country);
    params
        .distinguished_name
        .push(DnType::OrganizationName, "Test Government");
    params
        .distinguished_name
        .push(DnType::CommonName, format!("CSCA-TEST-{country}"));
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params.serial_number = Some(SerialNumber::from(1u64));
    params.not_before = OffsetDateTime::now_utc() - Duration::days(365);
    params.not_after = OffsetDateTime::now_utc() + Duration::days(3650);
    params
}

fn dsc_params(country: &str, serial: u64, window: (Duration, Duration)) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::new()).expect("empty SANs");
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CountryName, country);
    params
        .distinguished_name
        .push(DnType::OrganizationName, "Test Government");
    params
        .distinguished_name
        .push(DnType::CommonName, format!("DS-TEST-{country}-{serial}"));
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.serial_number = Some(SerialNumber::from(serial));
    params.not_before = OffsetDateTime::now_utc() - window.0;
    params.not_after = OffsetDateTime::now_utc() + window.1;
    params
}

impl TestPki {
    pub fn new(country: &'static str) -> Result<Self> {
        // DSC valid for another year.
        Self::with_dsc_window(country, (Duration::days(30), Duration::days(365)))
    }

    /// DSC already expired, but documents signed within its window.
    pub fn with_expired_dsc(country: &'static str) -> Result<Self> {
        Self::with_dsc_window(country, (Duration::days(400), -Duration::days(30)))
    }

    fn with_dsc_window(
        country: &'static str,
        window: (Duration, Duration),
    ) -> Result<Self> {
        let csca_key = KeyPair::generate()?;
        let params = csca_params(country);
        let csca_cert = params.clone().self_signed(&csca_key)?;
        let csca_der = csca_cert.der().to_vec();
        let csca_issuer = Issuer::new(
            params.clone(),
            KeyPair::try_from(csca_key.serialize_der().as_slice())?,
        );

        let dsc_serial = 0x4711u64;
        let dsc_key_pair = KeyPair::generate()?;
        let dsc_cert =
            dsc_params(country, dsc_serial, window).signed_by(&dsc_key_pair, &csca_issuer)?;
        let dsc_der = dsc_cert.der().to_vec();
        let dsc_key = SigningKey::from_pkcs8_der(&dsc_key_pair.serialize_der())?;

        Ok(Self {
            country,
            csca_der,
            dsc_der,
            dsc_key,
            csca_params: params,
            csca_key,
            dsc_serial,
        })
    }

    /// A fresh CRL revoking nothing.
    pub fn empty_crl(&self) -> Result<Vec<u8>> {
        self.crl_with(Vec::new())
    }

    /// A fresh CRL revoking the DSC.
    pub fn crl_revoking_dsc(&self) -> Result<Vec<u8>> {
        self.crl_with(vec![RevokedCertParams {
            serial_number:   SerialNumber::from(self.dsc_serial),
            revocation_time: OffsetDateTime::now_utc() - Duration::days(1),
            reason_code:     Some(RevocationReason::KeyCompromise),
            invalidity_date: None,
        }])
    }

    fn crl_with(&self, revoked_certs: Vec<RevokedCertParams>) -> Result<Vec<u8>> {
        let issuer = Issuer::new(
            self.csca_params.clone(),
            KeyPair::try_from(self.csca_key.serialize_der().as_slice())?,
        );
        let params = CertificateRevocationListParams {
            this_update: OffsetDateTime::now_utc() - Duration::hours(1),
            next_update: OffsetDateTime::now_utc() + Duration::days(30),
            crl_number: SerialNumber::from(7u64),
            issuing_distribution_point: None,
            revoked_certs,
            key_identifier_method: KeyIdMethod::Sha256,
        };
        let crl = params.signed_by(&issuer)?;
        Ok(crl.der().to_vec())
    }
}

/// TD-3 MRZ DG1 for document `M12345678`, issuing state KOR.
pub fn dg1_kr() -> Vec<u8> {
    let pad = |line: &str| format!("{line:<<44}");
    let mrz = pad("P<KORDOE<<JOHN") + &pad("M12345678<KOR8001014M2501017");
    let mut dg1 = vec![0x61, 0x5b, 0x5f, 0x1f, 0x58];
    dg1.extend_from_slice(mrz.as_bytes());
    dg1
}

fn sha256_alg() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid:        ID_SHA256,
        parameters: None,
    }
}

fn attribute(oid: Oid, value: Any) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

/// Assemble a CMS SignedData SOD over the given data groups, signed by
/// the DSC, optionally wrapped in the ICAO `0x77` application tag.
pub fn build_sod(pki: &TestPki, data_groups: &[(u8, &[u8])], wrap: bool) -> Result<Vec<u8>> {
    let lds = LdsSecurityObject {
        version:                0,
        hash_algorithm:         sha256_alg(),
        data_group_hash_values: data_groups
            .iter()
            .map(|(number, contents)| {
                Ok(DataGroupHash {
                    data_group_number: u64::from(*number),
                    hash_value:        OctetString::new(Sha256::digest(contents).to_vec())?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
        lds_version_info:       None,
    };
    let lds_der = lds.to_der()?;

    let signed_attrs = SetOfVec::try_from(vec![
        attribute(ID_CONTENT_TYPE, Any::from_der(&ID_LDS_SECURITY_OBJECT.to_der()?)?)?,
        attribute(
            ID_MESSAGE_DIGEST,
            Any::from_der(&OctetString::new(Sha256::digest(&lds_der).to_vec())?.to_der()?)?,
        )?,
    ])?;

    use p256::ecdsa::signature::Signer;
    let attrs_der = signed_attrs.to_der()?;
    let signature: p256::ecdsa::Signature = pki.dsc_key.sign(&attrs_der);
    let signature_der = signature.to_der();

    let dsc = Certificate::from_der(&pki.dsc_der)?;
    let signer_info = SignerInfo {
        version:             CmsVersion::V1,
        sid:                 SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer:        dsc.tbs_certificate.issuer.clone(),
            serial_number: dsc.tbs_certificate.serial_number.clone(),
        }),
        digest_alg:          sha256_alg(),
        signed_attrs:        Some(signed_attrs),
        signature_algorithm: AlgorithmIdentifierOwned {
            oid:        ID_ECDSA_WITH_SHA256,
            parameters: None,
        },
        signature:           OctetString::new(signature_der.as_bytes().to_vec())?,
        unsigned_attrs:      None,
    };

    let signed_data = SignedData {
        version:            CmsVersion::V3,
        digest_algorithms:  SetOfVec::try_from(vec![sha256_alg()])?,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: ID_LDS_SECURITY_OBJECT,
            econtent:      Some(Any::from_der(&OctetString::new(lds_der)?.to_der()?)?),
        },
        certificates:       Some(CertificateSet(SetOfVec::try_from(vec![
            CertificateChoices::Certificate(dsc),
        ])?)),
        crls:               None,
        signer_infos:       SignerInfos(SetOfVec::try_from(vec![signer_info])?),
    };

    let content_info = ContentInfo {
        content_type: ID_SIGNED_DATA,
        content:      Any::from_der(&signed_data.to_der()?)?,
    };
    let cms = content_info.to_der()?;

    if !wrap {
        return Ok(cms);
    }
    let mut wrapped = vec![0x77];
    let length = cms.len();
    if length < 0x80 {
        wrapped.push(length as u8);
    } else if length <= 0xff {
        wrapped.extend_from_slice(&[0x81, length as u8]);
    } else {
        wrapped.extend_from_slice(&[0x82, (length >> 8) as u8, length as u8]);
    }
    wrapped.extend_from_slice(&cms);
    Ok(wrapped)
}
