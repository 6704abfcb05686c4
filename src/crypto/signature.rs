//! Signature verification for the SOD.
//!
//! The DSC is the only trust anchor here; chain validation happens
//! separately in the PA engine. With signed attributes present, RFC 5652
//! requires the messageDigest attribute to match the digest of the
//! encapsulated content, and the signature to cover the DER of the
//! attribute set.

use {
    crate::{
        asn1::{oids, SecurityObject},
        x509::verify::{self, VerifyError},
    },
    der::{asn1::OctetString, Decode, Encode},
    sha1::Sha1,
    sha2::{Digest, Sha256, Sha384, Sha512},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum SodSignatureError {
    #[error("messageDigest attribute does not match the encapsulated content")]
    DigestMismatch,

    #[error("signed attributes are missing the messageDigest attribute")]
    MissingMessageDigest,

    #[error("signature verification failed")]
    Invalid,

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Der(#[from] der::Error),
}

fn digest_with_oid(oid: &der::asn1::ObjectIdentifier, data: &[u8]) -> Vec<u8> {
    match *oid {
        oids::ID_SHA1 => Sha1::digest(data).to_vec(),
        oids::ID_SHA384 => Sha384::digest(data).to_vec(),
        oids::ID_SHA512 => Sha512::digest(data).to_vec(),
        // ICAO 9303-10: SHA-256 is the default digest.
        _ => Sha256::digest(data).to_vec(),
    }
}

impl SecurityObject {
    /// Verify the SOD signature using the embedded DSC as the trust anchor.
    ///
    /// Signer-certificate chain checks are intentionally not performed
    /// here; the chain was validated separately against the PKD.
    pub fn verify_signature(&self) -> Result<(), SodSignatureError> {
        let signer = self.signer_info();
        let spki = verify::spki_of(self.dsc_der())?;

        let message = match signer.signed_attrs.as_ref() {
            Some(attrs) => {
                // RFC 5652 5.4: the messageDigest attribute must equal the
                // digest of the encapsulated content.
                let expected = attrs
                    .iter()
                    .find(|attr| attr.oid == oids::ID_MESSAGE_DIGEST)
                    .and_then(|attr| attr.values.as_slice().first())
                    .and_then(|value| value.decode_as::<OctetString>().ok())
                    .ok_or(SodSignatureError::MissingMessageDigest)?;
                let actual = digest_with_oid(&signer.digest_alg.oid, self.econtent_bytes());
                if expected.as_bytes() != actual.as_slice() {
                    return Err(SodSignatureError::DigestMismatch);
                }
                // The signature covers the DER of the attribute SET.
                attrs.to_der()?
            }
            None => self.econtent_bytes().to_vec(),
        };

        let verified = verify::verify_signature(
            &spki,
            &signer.signature_algorithm.oid,
            Some(&signer.digest_alg.oid),
            &message,
            signer.signature.as_bytes(),
        )?;
        if verified {
            Ok(())
        } else {
            Err(SodSignatureError::Invalid)
        }
    }
}
