//! End-to-end Passive Authentication scenarios against an in-memory
//! store and trust source.

mod fixtures;

use {
    anyhow::Result,
    fixtures::{build_sod, dg1_kr, TestPki},
    icao_local_pkd::{
        ldap::MemoryTrustSource,
        pa::{PaEngine, PaRequest},
        store::{
            create_schema, AuditLogStore, CertType, CertificateStore, QueryExecutor,
            SourceType, SqliteExecutor, VerificationStore,
        },
    },
    std::sync::Arc,
};

struct Harness {
    certificates:  CertificateStore,
    verifications: VerificationStore,
    engine:        PaEngine,
}

fn harness() -> Result<Harness> {
    let executor: Arc<dyn QueryExecutor> = Arc::new(SqliteExecutor::in_memory()?);
    create_schema(executor.as_ref())?;
    let certificates = CertificateStore::new(executor.clone());
    let verifications = VerificationStore::new(executor.clone());
    let audit = AuditLogStore::new(executor);
    let engine = PaEngine::new(certificates.clone(), verifications.clone(), audit);
    Ok(Harness {
        certificates,
        verifications,
        engine,
    })
}

fn trust_for(pki: &TestPki, crl: Option<Vec<u8>>) -> MemoryTrustSource {
    let mut trust = MemoryTrustSource::new();
    trust.add_csca(pki.country, pki.csca_der.clone());
    if let Some(crl) = crl {
        trust.set_crl(pki.country, crl);
    }
    trust
}

#[test]
fn happy_path_verification() -> Result<()> {
    let pki = TestPki::new("KR")?;
    let h = harness()?;
    let mut trust = trust_for(&pki, Some(pki.empty_crl()?));

    let dg1 = dg1_kr();
    let dg2 = b"jpeg face image bytes".to_vec();
    let sod = build_sod(&pki, &[(1, &dg1), (2, &dg2)], true)?;

    let request = PaRequest {
        sod,
        data_groups: vec![(1, dg1), (2, dg2)],
        ..PaRequest::default()
    };
    let outcome = h.engine.verify(&request, &mut trust)?;

    assert_eq!(outcome.status, "VALID");
    assert!(outcome.chain.chain_valid);
    assert!(outcome.sod_signature_valid);
    assert!(outcome.dg_hashes_valid);
    assert_eq!(outcome.chain.crl_status.as_str(), "VALID");
    assert_eq!(outcome.country_code, "KR");
    assert_eq!(outcome.document_number.as_deref(), Some("M12345678"));

    // Persisted record reflects the outcome.
    let id = outcome.verification_id.expect("persisted");
    let record = h.verifications.find_by_id(&id)?.expect("stored");
    assert_eq!(record.verification_status, "VALID");
    assert_eq!(record.issuing_country, "KR");
    assert_eq!(record.document_number.as_deref(), Some("M12345678"));
    assert!(record.trust_chain_valid && record.sod_signature_valid && record.dg_hashes_valid);
    assert!(!record.revoked);

    let data_groups = h.verifications.data_groups(&id)?;
    assert_eq!(data_groups.len(), 2);
    assert!(data_groups.iter().all(|dg| dg.hash_valid));
    Ok(())
}

#[test]
fn dsc_is_auto_registered_for_deferred_publication() -> Result<()> {
    let pki = TestPki::new("KR")?;
    let h = harness()?;
    let mut trust = trust_for(&pki, None);

    let sod = build_sod(&pki, &[], false)?;
    let request = PaRequest {
        sod,
        ..PaRequest::default()
    };
    h.engine.verify(&request, &mut trust)?;

    let fingerprint = icao_local_pkd::crypto::sha256_hex(&pki.dsc_der);
    let stored = h
        .certificates
        .get_by_fingerprint(CertType::Dsc, &fingerprint)?
        .expect("DSC auto-registered");
    assert_eq!(stored.source_type, SourceType::PaExtracted);
    assert!(!stored.stored_in_ldap);
    assert_eq!(stored.country_code, "KR");

    // A second verification does not create a second row.
    let sod = build_sod(&pki, &[], false)?;
    h.engine.verify(
        &PaRequest {
            sod,
            ..PaRequest::default()
        },
        &mut trust,
    )?;
    let rows = h.certificates.find_by_country(CertType::Dsc, "KR")?;
    assert_eq!(rows.len(), 1);
    Ok(())
}

#[test]
fn missing_csca_fails_without_crl_lookup() -> Result<()> {
    let pki = TestPki::new("KR")?;
    let h = harness()?;
    // Trust source knows nothing about KR.
    let mut trust = MemoryTrustSource::new();

    let sod = build_sod(&pki, &[], true)?;
    let outcome = h.engine.verify(
        &PaRequest {
            sod,
            ..PaRequest::default()
        },
        &mut trust,
    )?;

    assert_eq!(outcome.status, "INVALID");
    assert!(!outcome.chain.chain_valid);
    assert!(outcome
        .chain
        .validation_errors
        .as_deref()
        .unwrap_or_default()
        .contains("CSCA not found for issuer"));
    assert!(!outcome.chain.crl_checked);
    assert_eq!(outcome.chain.crl_status.as_str(), "NOT_CHECKED");

    // The failed attempt is still persisted.
    let id = outcome.verification_id.expect("persisted");
    let record = h.verifications.find_by_id(&id)?.expect("stored");
    assert_eq!(record.verification_status, "INVALID");
    Ok(())
}

#[test]
fn revoked_dsc_is_critical() -> Result<()> {
    let pki = TestPki::new("KR")?;
    let h = harness()?;
    let mut trust = trust_for(&pki, Some(pki.crl_revoking_dsc()?));

    let sod = build_sod(&pki, &[], true)?;
    let outcome = h.engine.verify(
        &PaRequest {
            sod,
            ..PaRequest::default()
        },
        &mut trust,
    )?;

    assert_eq!(outcome.status, "INVALID");
    assert!(outcome.chain.revoked);
    assert_eq!(outcome.chain.crl_status.as_str(), "REVOKED");
    assert_eq!(outcome.crl_message.severity.as_str(), "CRITICAL");
    assert!(!outcome.chain.chain_valid);
    Ok(())
}

#[test]
fn expired_dsc_valid_at_signing_time() -> Result<()> {
    let pki = TestPki::with_expired_dsc("KR")?;
    let h = harness()?;
    let mut trust = trust_for(&pki, Some(pki.empty_crl()?));

    let sod = build_sod(&pki, &[], true)?;
    // Signed 90 days ago, well inside the DSC window.
    let signing_time = chrono::Utc::now() - chrono::Duration::days(90);
    let outcome = h.engine.verify(
        &PaRequest {
            sod,
            signing_time: Some(signing_time),
            ..PaRequest::default()
        },
        &mut trust,
    )?;

    assert!(outcome.chain.chain_valid, "point-in-time trust holds");
    assert!(outcome.chain.dsc_expired);
    assert_eq!(outcome.chain.expiration_status.as_str(), "EXPIRED");
    assert_eq!(outcome.chain.valid_at_signing_time, Some(true));
    assert_eq!(outcome.status, "VALID");
    assert_eq!(outcome.expiration_message.code, "EXPIRED");
    Ok(())
}

#[test]
fn tampered_data_group_fails_exactly_that_group() -> Result<()> {
    let pki = TestPki::new("KR")?;
    let h = harness()?;
    let mut trust = trust_for(&pki, Some(pki.empty_crl()?));

    let dg1 = dg1_kr();
    let dg2 = b"genuine image".to_vec();
    let sod = build_sod(&pki, &[(1, &dg1), (2, &dg2)], true)?;

    let outcome = h.engine.verify(
        &PaRequest {
            sod,
            data_groups: vec![(1, dg1), (2, b"tampered image".to_vec())],
            ..PaRequest::default()
        },
        &mut trust,
    )?;

    assert_eq!(outcome.status, "INVALID");
    assert!(!outcome.dg_hashes_valid);
    assert!(outcome.sod_signature_valid, "signature still verifies");
    assert!(outcome.chain.chain_valid, "chain unaffected");

    let invalid: Vec<u8> = outcome
        .data_groups
        .iter()
        .filter(|dg| !dg.hash_valid)
        .map(|dg| dg.dg_number)
        .collect();
    assert_eq!(invalid, vec![2]);
    Ok(())
}

#[test]
fn malformed_sod_persists_an_error_outcome() -> Result<()> {
    let h = harness()?;
    let mut trust = MemoryTrustSource::new();

    let outcome = h.engine.verify(
        &PaRequest {
            sod: vec![0x77, 0x03, 0x30, 0x01, 0x00],
            ..PaRequest::default()
        },
        &mut trust,
    )?;

    assert_eq!(outcome.status, "ERROR");
    assert!(outcome.error.is_some());
    let id = outcome.verification_id.expect("persisted even on error");
    let record = h.verifications.find_by_id(&id)?.expect("stored");
    assert_eq!(record.verification_status, "ERROR");
    assert!(record.validation_errors.is_some());
    Ok(())
}
