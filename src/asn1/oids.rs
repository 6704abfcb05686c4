//! Object identifiers and name tables used across the PKD.

use der::asn1::ObjectIdentifier as Oid;

/// RFC 5652 id-signedData
pub const ID_SIGNED_DATA: Oid = Oid::new_unwrap("1.2.840.113549.1.7.2");

/// ICAO-9303-10 4.6.2.3 id-icao-mrtd-security-ldsSecurityObject
pub const ID_LDS_SECURITY_OBJECT: Oid = Oid::new_unwrap("2.23.136.1.1.1");

/// RFC 5652 id-contentType signed attribute
pub const ID_CONTENT_TYPE: Oid = Oid::new_unwrap("1.2.840.113549.1.9.3");

/// RFC 5652 id-messageDigest signed attribute
pub const ID_MESSAGE_DIGEST: Oid = Oid::new_unwrap("1.2.840.113549.1.9.4");

/// RFC 5652 id-signingTime signed attribute
pub const ID_SIGNING_TIME: Oid = Oid::new_unwrap("1.2.840.113549.1.9.5");

// Digest algorithms
pub const ID_SHA1: Oid = Oid::new_unwrap("1.3.14.3.2.26");
pub const ID_SHA256: Oid = Oid::new_unwrap("2.16.840.1.101.3.4.2.1");
pub const ID_SHA384: Oid = Oid::new_unwrap("2.16.840.1.101.3.4.2.2");
pub const ID_SHA512: Oid = Oid::new_unwrap("2.16.840.1.101.3.4.2.3");
pub const ID_SHA224: Oid = Oid::new_unwrap("2.16.840.1.101.3.4.2.4");

// Signature algorithms
pub const ID_SHA1_WITH_RSA: Oid = Oid::new_unwrap("1.2.840.113549.1.1.5");
pub const ID_RSASSA_PSS: Oid = Oid::new_unwrap("1.2.840.113549.1.1.10");
pub const ID_SHA256_WITH_RSA: Oid = Oid::new_unwrap("1.2.840.113549.1.1.11");
pub const ID_SHA384_WITH_RSA: Oid = Oid::new_unwrap("1.2.840.113549.1.1.12");
pub const ID_SHA512_WITH_RSA: Oid = Oid::new_unwrap("1.2.840.113549.1.1.13");
pub const ID_ECDSA_WITH_SHA1: Oid = Oid::new_unwrap("1.2.840.10045.4.1");
pub const ID_ECDSA_WITH_SHA256: Oid = Oid::new_unwrap("1.2.840.10045.4.3.2");
pub const ID_ECDSA_WITH_SHA384: Oid = Oid::new_unwrap("1.2.840.10045.4.3.3");
pub const ID_ECDSA_WITH_SHA512: Oid = Oid::new_unwrap("1.2.840.10045.4.3.4");

// Public key algorithms and named curves
pub const ID_RSA_ENCRYPTION: Oid = Oid::new_unwrap("1.2.840.113549.1.1.1");
pub const ID_EC_PUBLIC_KEY: Oid = Oid::new_unwrap("1.2.840.10045.2.1");
pub const ID_NIST_P256: Oid = Oid::new_unwrap("1.2.840.10045.3.1.7");
pub const ID_NIST_P384: Oid = Oid::new_unwrap("1.3.132.0.34");
pub const ID_NIST_P521: Oid = Oid::new_unwrap("1.3.132.0.35");

// DN attribute types (RFC 4519)
pub const ID_AT_COMMON_NAME: Oid = Oid::new_unwrap("2.5.4.3");
pub const ID_AT_SERIAL_NUMBER: Oid = Oid::new_unwrap("2.5.4.5");
pub const ID_AT_COUNTRY_NAME: Oid = Oid::new_unwrap("2.5.4.6");
pub const ID_AT_LOCALITY_NAME: Oid = Oid::new_unwrap("2.5.4.7");
pub const ID_AT_STATE_NAME: Oid = Oid::new_unwrap("2.5.4.8");
pub const ID_AT_ORGANIZATION_NAME: Oid = Oid::new_unwrap("2.5.4.10");
pub const ID_AT_ORG_UNIT_NAME: Oid = Oid::new_unwrap("2.5.4.11");
pub const ID_EMAIL_ADDRESS: Oid = Oid::new_unwrap("1.2.840.113549.1.9.1");

/// Digest algorithm display name, as used in stored hash-algorithm columns.
pub fn digest_name(oid: &Oid) -> Option<&'static str> {
    Some(match *oid {
        ID_SHA1 => "SHA-1",
        ID_SHA224 => "SHA-224",
        ID_SHA256 => "SHA-256",
        ID_SHA384 => "SHA-384",
        ID_SHA512 => "SHA-512",
        _ => return None,
    })
}

/// Signature algorithm display name (`SHA256withRSA` style).
///
/// Unknown algorithms fall back to the dotted OID via
/// [`signature_algorithm_label`].
pub fn signature_algorithm_name(oid: &Oid) -> Option<&'static str> {
    Some(match *oid {
        ID_SHA1_WITH_RSA => "SHA1withRSA",
        ID_SHA256_WITH_RSA => "SHA256withRSA",
        ID_SHA384_WITH_RSA => "SHA384withRSA",
        ID_SHA512_WITH_RSA => "SHA512withRSA",
        ID_RSASSA_PSS => "RSASSA-PSS",
        ID_ECDSA_WITH_SHA1 => "SHA1withECDSA",
        ID_ECDSA_WITH_SHA256 => "SHA256withECDSA",
        ID_ECDSA_WITH_SHA384 => "SHA384withECDSA",
        ID_ECDSA_WITH_SHA512 => "SHA512withECDSA",
        _ => return None,
    })
}

/// Best-effort label for any algorithm OID: the `SHA256withRSA` style name,
/// the registry short name, or the dotted form.
pub fn signature_algorithm_label(oid: &Oid) -> String {
    if let Some(name) = signature_algorithm_name(oid) {
        return name.to_string();
    }
    const_oid::db::DB
        .by_oid(oid)
        .map_or_else(|| oid.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_names() {
        assert_eq!(digest_name(&ID_SHA256), Some("SHA-256"));
        assert_eq!(digest_name(&ID_SHA1), Some("SHA-1"));
        assert_eq!(digest_name(&ID_RSA_ENCRYPTION), None);
    }

    #[test]
    fn signature_labels_fall_back_to_dotted_oid() {
        assert_eq!(
            signature_algorithm_label(&ID_ECDSA_WITH_SHA256),
            "SHA256withECDSA"
        );
        let exotic = Oid::new_unwrap("1.2.3.4.5");
        assert_eq!(signature_algorithm_label(&exotic), "1.2.3.4.5");
    }
}
