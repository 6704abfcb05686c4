//! Store-level invariants: content addressing, the duplicate ledger,
//! DN-based lookup and reconciliation candidate selection.

mod fixtures;

use {
    anyhow::Result,
    fixtures::TestPki,
    icao_local_pkd::{
        store::{
            create_schema, AuditLogStore, AuditRecord, CertType, CertificateStore, CrlStore,
            NewCertificate, NewCrl, PutOutcome, QueryExecutor, ReconOpRow, ReconciliationStore,
            SightingMeta, SourceType, SqliteExecutor, SyncStatusRecord, SyncStatusStore,
            TypeCounts,
        },
        x509::{CertificateInfo, CrlInfo},
    },
    std::sync::Arc,
};

fn executor() -> Result<Arc<dyn QueryExecutor>> {
    let executor: Arc<dyn QueryExecutor> = Arc::new(SqliteExecutor::in_memory()?);
    create_schema(executor.as_ref())?;
    Ok(executor)
}

fn new_csca(pki: &TestPki) -> Result<NewCertificate> {
    let info = CertificateInfo::from_der(&pki.csca_der)?;
    Ok(NewCertificate::from_parsed(
        CertType::Csca,
        &info,
        SourceType::Upload,
        None,
    ))
}

#[test]
fn repeated_import_collapses_to_duplicate_sighting() -> Result<()> {
    let pki = TestPki::new("KR")?;
    let store = CertificateStore::new(executor()?);
    let cert = new_csca(&pki)?;

    let first = store.put(&cert, &SightingMeta {
        upload_id: Some("upload-1".to_string()),
        source_file_name: Some("ml-2026-01.ldif".to_string()),
        ..SightingMeta::default()
    })?;
    let PutOutcome::Inserted(id) = first else {
        panic!("first import must insert");
    };

    let second = store.put(&cert, &SightingMeta {
        upload_id: Some("upload-2".to_string()),
        source_file_name: Some("ml-2026-02.ldif".to_string()),
        ..SightingMeta::default()
    })?;
    assert_eq!(second, PutOutcome::Duplicate(id.clone()));

    // One row, one sighting; the ledger only grows.
    assert_eq!(store.find_by_country(CertType::Csca, "KR")?.len(), 1);
    assert_eq!(store.count_sightings(&id)?, 1);

    // The same (upload, file) pair is idempotent; a new pair is retained.
    store.record_sighting(&id, &SightingMeta {
        upload_id: Some("upload-2".to_string()),
        source_file_name: Some("ml-2026-02.ldif".to_string()),
        ..SightingMeta::default()
    })?;
    assert_eq!(store.count_sightings(&id)?, 1);
    store.record_sighting(&id, &SightingMeta {
        upload_id: Some("upload-3".to_string()),
        source_file_name: Some("ml-2026-03.ldif".to_string()),
        ..SightingMeta::default()
    })?;
    assert_eq!(store.count_sightings(&id)?, 2);
    Ok(())
}

#[test]
fn fingerprint_matches_stored_der() -> Result<()> {
    let pki = TestPki::new("FR")?;
    let store = CertificateStore::new(executor()?);
    let cert = new_csca(&pki)?;
    let outcome = store.put(&cert, &SightingMeta::default())?;

    let record = store
        .get_by_fingerprint(CertType::Csca, &cert.fingerprint_sha256)?
        .expect("stored");
    assert_eq!(record.id, outcome.id());
    assert_eq!(
        icao_local_pkd::crypto::sha256_hex(&record.der),
        record.fingerprint_sha256
    );
    assert!(record.is_self_signed);
    Ok(())
}

#[test]
fn issuer_lookup_is_dn_format_independent() -> Result<()> {
    let pki = TestPki::new("KR")?;
    let store = CertificateStore::new(executor()?);
    store.put(&new_csca(&pki)?, &SightingMeta::default())?;

    // The stored subject is RFC 2253; query with the OpenSSL oneline form.
    let oneline = "/C=KR/O=Test Government/CN=CSCA-TEST-KR";
    let matches = store.find_by_issuer(CertType::Csca, oneline, "KR")?;
    assert_eq!(matches.len(), 1);

    let nobody = store.find_by_issuer(CertType::Csca, "/C=KR/O=Someone Else/CN=Nope", "KR")?;
    assert!(nobody.is_empty());
    Ok(())
}

#[test]
fn reconciliation_candidates_shrink_as_flags_flip() -> Result<()> {
    let pki = TestPki::new("DE")?;
    let store = CertificateStore::new(executor()?);
    let outcome = store.put(&new_csca(&pki)?, &SightingMeta::default())?;

    let pending = store.find_missing_in_ldap(CertType::Csca, 100)?;
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].stored_in_ldap);

    store.mark_stored_in_ldap(outcome.id())?;
    assert!(store.find_missing_in_ldap(CertType::Csca, 100)?.is_empty());
    Ok(())
}

#[test]
fn crl_rows_are_unique_per_country_and_fingerprint() -> Result<()> {
    let pki = TestPki::new("KR")?;
    let executor = executor()?;
    let store = CrlStore::new(executor);
    let crl = CrlInfo::from_der(&pki.empty_crl()?)?;
    let new_crl = NewCrl::from_parsed(&crl, Some("KR"));

    let first = store.put(&new_crl)?;
    let second = store.put(&new_crl)?;
    assert_eq!(first, second);
    assert_eq!(store.count()?, 1);

    let latest = store.find_latest_by_country("KR")?.expect("stored");
    assert_eq!(latest.fingerprint_sha256, crl.fingerprint_sha256);
    assert!(latest.this_update.is_some());
    assert!(latest.next_update.is_some());
    Ok(())
}

#[test]
fn sync_status_invariants() -> Result<()> {
    let store = SyncStatusStore::new(executor()?);
    let record = SyncStatusRecord {
        id: String::new(),
        checked_at: None,
        db: TypeCounts {
            csca:   10,
            mlsc:   1,
            dsc:    50,
            dsc_nc: 3,
            crl:    4,
        },
        ldap: TypeCounts {
            csca:   8,
            mlsc:   1,
            dsc:    53,
            dsc_nc: 3,
            crl:    4,
        },
        ldap_total_entries: 69,
        status: "DISCREPANCY".to_string(),
        error_message: None,
        db_country_stats: None,
        ldap_country_stats: None,
        check_duration_ms: 12,
    };
    // Σ|db − ldap| over all types, not the signed sum.
    assert_eq!(record.total_discrepancy(), 5);

    let id = store.insert(&record)?;
    let latest = store.find_latest()?.expect("stored");
    assert_eq!(latest.id, id);
    assert_eq!(latest.total_discrepancy(), 5);
    assert_eq!(latest.status, "DISCREPANCY");
    Ok(())
}

#[test]
fn reconciliation_summary_lifecycle() -> Result<()> {
    let store = ReconciliationStore::new(executor()?);
    let id = store.open_summary("MANUAL", None, false)?;

    let open = store.find_summary(&id)?.expect("open summary");
    assert_eq!(open.status, "IN_PROGRESS");

    store.log_operation(&ReconOpRow {
        summary_id:         id.clone(),
        operation:          "ADD".to_string(),
        certificate_type:   Some("CSCA".to_string()),
        fingerprint_sha256: Some("ab".repeat(32)),
        country_code:       Some("KR".to_string()),
        ldap_dn:            Some("cn=x,o=csca,c=KR,dc=data,dc=example".to_string()),
        result:             "SUCCESS".to_string(),
        error_message:      None,
        duration_ms:        3,
    })?;

    let mut closed = open.clone();
    closed.csca_added = 1;
    closed.success_count = 1;
    closed.status = "COMPLETED".to_string();
    closed.duration_ms = 40;
    store.close_summary(&id, &closed)?;

    let done = store.find_summary(&id)?.expect("closed summary");
    assert_eq!(done.status, "COMPLETED");
    assert_eq!(done.csca_added, 1);
    assert_eq!(store.operations(&id)?.len(), 1);
    Ok(())
}

#[test]
fn audit_writes_never_fail_the_operation() -> Result<()> {
    let executor = executor()?;
    let audit = AuditLogStore::new(executor.clone());

    let mut record = AuditRecord::new("CONFIG_CHANGE");
    record.subject = Some("admin".to_string());
    record.metadata = Some(serde_json::json!({"dailySyncHour": 3}));
    audit.record(&record);

    // Even against a broken table the call must not panic or error.
    executor.execute("DROP TABLE operation_audit_log", &[])?;
    audit.record(&record);
    Ok(())
}
