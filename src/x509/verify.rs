//! Signature verification dispatch for certificates, CRLs and SOD signer
//! infos.
//!
//! Covers the algorithms observed in the PKD corpus: PKCS#1 v1.5 RSA with
//! SHA-1/256/384/512 and ECDSA over P-256/P-384. Verification failure is
//! `Ok(false)`; `Err` is reserved for inputs this dispatcher cannot judge
//! (unsupported algorithm, malformed key material), which callers log and
//! treat as non-verifying.

use {
    crate::asn1::oids,
    der::{asn1::ObjectIdentifier as Oid, Decode, Encode},
    p256::ecdsa::signature::hazmat::PrehashVerifier,
    rsa::{pkcs1::DecodeRsaPublicKey, Pkcs1v15Sign, RsaPublicKey},
    sha1::Sha1,
    sha2::{Digest, Sha256, Sha384, Sha512},
    thiserror::Error,
    x509_cert::{crl::CertificateList, spki::SubjectPublicKeyInfoOwned, Certificate},
};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("unsupported signature algorithm {0}")]
    UnsupportedAlgorithm(Oid),

    #[error("unsupported elliptic curve {0}")]
    UnsupportedCurve(Oid),

    #[error("malformed public key: {0}")]
    BadKey(String),

    #[error("malformed signature encoding")]
    BadSignature,

    #[error(transparent)]
    Der(#[from] der::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DigestKind {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

fn digest_message(kind: DigestKind, message: &[u8]) -> Vec<u8> {
    match kind {
        DigestKind::Sha1 => Sha1::digest(message).to_vec(),
        DigestKind::Sha256 => Sha256::digest(message).to_vec(),
        DigestKind::Sha384 => Sha384::digest(message).to_vec(),
        DigestKind::Sha512 => Sha512::digest(message).to_vec(),
    }
}

fn digest_kind_of(oid: &Oid) -> Option<DigestKind> {
    Some(match *oid {
        oids::ID_SHA1 => DigestKind::Sha1,
        oids::ID_SHA256 => DigestKind::Sha256,
        oids::ID_SHA384 => DigestKind::Sha384,
        oids::ID_SHA512 => DigestKind::Sha512,
        _ => return None,
    })
}

/// Resolve a signature algorithm OID to `(key family, digest)`.
///
/// Some signers put the bare key algorithm (`rsaEncryption`,
/// `id-ecPublicKey`) in the signature-algorithm field; for those the
/// `digest_hint` (the signer-info digest algorithm) decides the digest.
fn resolve_algorithm(
    sig_oid: &Oid,
    digest_hint: Option<&Oid>,
) -> Result<(KeyFamily, DigestKind), VerifyError> {
    let hint = || {
        digest_hint
            .and_then(digest_kind_of)
            .unwrap_or(DigestKind::Sha256)
    };
    Ok(match *sig_oid {
        oids::ID_SHA1_WITH_RSA => (KeyFamily::Rsa, DigestKind::Sha1),
        oids::ID_SHA256_WITH_RSA => (KeyFamily::Rsa, DigestKind::Sha256),
        oids::ID_SHA384_WITH_RSA => (KeyFamily::Rsa, DigestKind::Sha384),
        oids::ID_SHA512_WITH_RSA => (KeyFamily::Rsa, DigestKind::Sha512),
        oids::ID_RSA_ENCRYPTION => (KeyFamily::Rsa, hint()),
        oids::ID_ECDSA_WITH_SHA1 => (KeyFamily::Ecdsa, DigestKind::Sha1),
        oids::ID_ECDSA_WITH_SHA256 => (KeyFamily::Ecdsa, DigestKind::Sha256),
        oids::ID_ECDSA_WITH_SHA384 => (KeyFamily::Ecdsa, DigestKind::Sha384),
        oids::ID_ECDSA_WITH_SHA512 => (KeyFamily::Ecdsa, DigestKind::Sha512),
        oids::ID_EC_PUBLIC_KEY => (KeyFamily::Ecdsa, hint()),
        other => return Err(VerifyError::UnsupportedAlgorithm(other)),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyFamily {
    Rsa,
    Ecdsa,
}

fn rsa_scheme(kind: DigestKind) -> Pkcs1v15Sign {
    match kind {
        DigestKind::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        DigestKind::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestKind::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        DigestKind::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

/// Verify `signature` over `message` under `spki`, using the signature
/// algorithm identified by `sig_oid` (and `digest_hint` where the OID does
/// not pin a digest).
pub fn verify_signature(
    spki: &SubjectPublicKeyInfoOwned,
    sig_oid: &Oid,
    digest_hint: Option<&Oid>,
    message: &[u8],
    signature: &[u8],
) -> Result<bool, VerifyError> {
    let (family, digest) = resolve_algorithm(sig_oid, digest_hint)?;
    let key_bytes = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| VerifyError::BadKey("public key has unused bits".to_string()))?;

    match family {
        KeyFamily::Rsa => {
            let key = RsaPublicKey::from_pkcs1_der(key_bytes)
                .map_err(|e| VerifyError::BadKey(e.to_string()))?;
            let hashed = digest_message(digest, message);
            Ok(key.verify(rsa_scheme(digest), &hashed, signature).is_ok())
        }
        KeyFamily::Ecdsa => {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.decode_as::<Oid>().ok())
                .ok_or_else(|| VerifyError::BadKey("missing EC named curve".to_string()))?;
            let hashed = digest_message(digest, message);
            match curve {
                oids::ID_NIST_P256 => {
                    let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes)
                        .map_err(|e| VerifyError::BadKey(e.to_string()))?;
                    let sig = p256::ecdsa::Signature::from_der(signature)
                        .map_err(|_| VerifyError::BadSignature)?;
                    Ok(key.verify_prehash(&hashed, &sig).is_ok())
                }
                oids::ID_NIST_P384 => {
                    let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(key_bytes)
                        .map_err(|e| VerifyError::BadKey(e.to_string()))?;
                    let sig = p384::ecdsa::Signature::from_der(signature)
                        .map_err(|_| VerifyError::BadSignature)?;
                    Ok(key.verify_prehash(&hashed, &sig).is_ok())
                }
                other => Err(VerifyError::UnsupportedCurve(other)),
            }
        }
    }
}

/// Verify that `child` (DER) was signed by the holder of `issuer_spki`.
///
/// This is the single-step chain check: the message is the DER of the
/// TBSCertificate, the signature the certificate's outer signature.
pub fn verify_certificate_signature(
    child_der: &[u8],
    issuer_spki: &SubjectPublicKeyInfoOwned,
) -> Result<bool, VerifyError> {
    let child = Certificate::from_der(child_der)?;
    let message = child.tbs_certificate.to_der()?;
    let signature = child
        .signature
        .as_bytes()
        .ok_or(VerifyError::BadSignature)?;
    verify_signature(
        issuer_spki,
        &child.signature_algorithm.oid,
        None,
        &message,
        signature,
    )
}

/// Verify a CRL's signature under the issuing CA's public key.
pub fn verify_crl_signature(
    crl: &CertificateList,
    issuer_spki: &SubjectPublicKeyInfoOwned,
) -> Result<bool, VerifyError> {
    let message = crl.tbs_cert_list.to_der()?;
    let signature = crl.signature.as_bytes().ok_or(VerifyError::BadSignature)?;
    verify_signature(
        issuer_spki,
        &crl.signature_algorithm.oid,
        None,
        &message,
        signature,
    )
}

/// Parse the subject public key info out of a DER certificate.
pub fn spki_of(cert_der: &[u8]) -> Result<SubjectPublicKeyInfoOwned, VerifyError> {
    let cert = Certificate::from_der(cert_der)?;
    Ok(cert.tbs_certificate.subject_public_key_info)
}
