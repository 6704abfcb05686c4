//! SOD parsing and signature verification against generated material.

mod fixtures;

use {
    anyhow::Result,
    fixtures::{build_sod, TestPki},
    icao_local_pkd::{asn1::SecurityObject, crypto, x509::CertificateInfo},
};

#[test]
fn parses_wrapped_and_bare_sod() -> Result<()> {
    let pki = TestPki::new("KR")?;
    let dg2 = b"image".to_vec();

    for wrap in [true, false] {
        let sod_bytes = build_sod(&pki, &[(2, &dg2)], wrap)?;
        let sod = SecurityObject::from_bytes(&sod_bytes)?;

        assert_eq!(sod.dsc_der(), pki.dsc_der.as_slice());
        assert_eq!(sod.digest_algorithm_name(), "SHA-256");
        assert_eq!(sod.signature_algorithm_name(), "SHA256withECDSA");

        let lds = sod.lds_security_object();
        assert_eq!(lds.hash_algorithm_name(), "SHA-256");
        let expected = crypto::digest_by_name("SHA-256", &dg2)?;
        assert_eq!(lds.hash_for_dg(2), Some(expected.as_slice()));
        assert_eq!(lds.hash_for_dg(3), None);
    }
    Ok(())
}

#[test]
fn signature_verifies_and_tampering_is_detected() -> Result<()> {
    let pki = TestPki::new("KR")?;
    let sod_bytes = build_sod(&pki, &[(2, b"image")], false)?;

    let sod = SecurityObject::from_bytes(&sod_bytes)?;
    sod.verify_signature()?;

    // Flip one bit inside the signature OCTET STRING; the structure still
    // parses but verification must fail.
    let signature_len = sod.signer_info().signature.as_bytes().len();
    let mut tampered = sod_bytes.clone();
    let position = tampered.len() - signature_len / 2;
    tampered[position] ^= 0x01;
    if let Ok(parsed) = SecurityObject::from_bytes(&tampered) {
        assert!(parsed.verify_signature().is_err());
    }
    Ok(())
}

#[test]
fn dsc_metadata_extraction() -> Result<()> {
    let pki = TestPki::new("KR")?;
    let info = CertificateInfo::from_der(&pki.dsc_der)?;

    assert_eq!(info.issuer.country.as_deref(), Some("KR"));
    assert_eq!(info.public_key_algorithm, "ECDSA");
    assert_eq!(info.public_key_bits, 256);
    assert!(!info.is_self_signed);
    assert_eq!(info.serial_number, "4711");
    assert_eq!(
        info.fingerprint_sha256,
        crypto::sha256_hex(&pki.dsc_der)
    );

    let csca = CertificateInfo::from_der(&pki.csca_der)?;
    assert!(csca.is_self_signed);
    assert_eq!(csca.subject.common_name.as_deref(), Some("CSCA-TEST-KR"));
    Ok(())
}
