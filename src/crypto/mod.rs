//! Digest computation for data groups and fingerprints.

mod signature;

pub use signature::SodSignatureError;
use {
    sha1::Sha1,
    sha2::{Digest, Sha224, Sha256, Sha384, Sha512},
    subtle::ConstantTimeEq,
    thiserror::Error,
};

#[derive(Debug, Error)]
#[error("unsupported digest algorithm {0:?}")]
pub struct UnsupportedDigest(pub String);

/// Hash `data` with the digest named in an LDSSecurityObject
/// (`SHA-1` .. `SHA-512`, tolerant of `SHA256`-style spellings).
pub fn digest_by_name(algorithm: &str, data: &[u8]) -> Result<Vec<u8>, UnsupportedDigest> {
    let canonical = algorithm.trim().to_ascii_uppercase().replace('_', "-");
    Ok(match canonical.as_str() {
        "SHA-1" | "SHA1" => Sha1::digest(data).to_vec(),
        "SHA-224" | "SHA224" => Sha224::digest(data).to_vec(),
        "SHA-256" | "SHA256" => Sha256::digest(data).to_vec(),
        "SHA-384" | "SHA384" => Sha384::digest(data).to_vec(),
        "SHA-512" | "SHA512" => Sha512::digest(data).to_vec(),
        _ => return Err(UnsupportedDigest(algorithm.to_string())),
    })
}

/// Lowercase hex SHA-256, the content address used for certificates, CRLs
/// and SODs.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Constant-time hash comparison, case-insensitive on the hex side.
pub fn hashes_equal(expected_hex: &str, actual: &[u8]) -> bool {
    match hex::decode(expected_hex) {
        Ok(expected) => expected.ct_eq(actual).into(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use {super::*, hex_literal::hex};

    #[test]
    fn digest_name_spellings() {
        let data = b"abc";
        let expected =
            hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(digest_by_name("SHA-256", data).unwrap(), expected);
        assert_eq!(digest_by_name("sha256", data).unwrap(), expected);
        assert!(digest_by_name("MD5", data).is_err());
    }

    #[test]
    fn hash_compare_is_case_insensitive() {
        let digest = digest_by_name("SHA-1", b"abc").unwrap();
        let hex_lower = hex::encode(&digest);
        let hex_upper = hex_lower.to_uppercase();
        assert!(hashes_equal(&hex_lower, &digest));
        assert!(hashes_equal(&hex_upper, &digest));
        assert!(!hashes_equal(&hex_lower, b"not the digest bytes"));
    }
}
