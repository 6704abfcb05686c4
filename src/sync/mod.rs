//! DB ↔ LDAP synchronization: the sync-check, the reconciliation engine
//! and the daily scheduler.
//!
//! The relational store is authoritative. The sync-check only measures;
//! the reconciliation engine repairs one way (DB → LDAP); the scheduler
//! sequences check, optional revalidation and optional auto-reconcile once
//! a day or on demand.

pub mod recon;
pub mod scheduler;

pub use self::{
    recon::{ReconcileOptions, ReconciliationEngine},
    scheduler::{DailyTasks, SyncScheduler},
};
use {
    crate::{
        error::Error,
        ldap::DirectoryGateway,
        pa::ChainValidator,
        store::{
            AuditLogStore, AuditRecord, CertType, CertificateStore, CrlStore, IcaoVersionStore,
            RevalidationRun, RevocationStatus, SyncStatusRecord, SyncStatusStore, TypeCounts,
            ValidationOutcomeRow,
        },
        x509::CertificateInfo,
    },
    chrono::Utc,
    std::time::Instant,
    tracing::{info, warn},
};

/// Runs DB-vs-LDAP count comparisons and certificate revalidation passes.
pub struct SyncService {
    certificates: CertificateStore,
    crls:         CrlStore,
    statuses:     SyncStatusStore,
    versions:     IcaoVersionStore,
    audit:        AuditLogStore,
}

impl SyncService {
    pub fn new(
        certificates: CertificateStore,
        crls: CrlStore,
        statuses: SyncStatusStore,
        versions: IcaoVersionStore,
        audit: AuditLogStore,
    ) -> Self {
        Self {
            certificates,
            crls,
            statuses,
            versions,
            audit,
        }
    }

    /// Compare store and directory counts per type and persist the
    /// outcome. A directory failure still records a row, with status
    /// `ERROR`.
    pub fn run_sync_check(
        &self,
        gateway: &DirectoryGateway,
    ) -> Result<SyncStatusRecord, Error> {
        let started = Instant::now();
        info!("starting sync check");

        let type_counts = self.certificates.counts_by_type()?;
        let db = TypeCounts {
            csca:   type_counts.get(&CertType::Csca).copied().unwrap_or(0),
            mlsc:   type_counts.get(&CertType::Mlsc).copied().unwrap_or(0),
            dsc:    type_counts.get(&CertType::Dsc).copied().unwrap_or(0),
            dsc_nc: type_counts.get(&CertType::DscNc).copied().unwrap_or(0),
            crl:    self.crls.count()?,
        };
        let db_country_stats = self.db_country_stats()?;

        let mut record = SyncStatusRecord {
            id: String::new(),
            checked_at: Some(Utc::now()),
            db,
            ldap: TypeCounts::default(),
            ldap_total_entries: 0,
            status: "ERROR".to_string(),
            error_message: None,
            db_country_stats: Some(db_country_stats),
            ldap_country_stats: None,
            check_duration_ms: 0,
        };

        match gateway.session().and_then(|mut session| session.count_entries()) {
            Ok(directory) => {
                record.ldap = directory.counts;
                record.ldap_total_entries = directory.total_entries;
                record.ldap_country_stats = serde_json::to_value(&directory.by_country).ok();
                record.status = if record.total_discrepancy() == 0 {
                    "SYNCED".to_string()
                } else {
                    "DISCREPANCY".to_string()
                };
            }
            Err(directory_error) => {
                warn!(%directory_error, "sync check could not reach the directory");
                record.error_message = Some(directory_error.to_string());
            }
        }

        record.check_duration_ms = started.elapsed().as_millis() as i64;
        let id = self.statuses.insert(&record)?;
        record.id = id;

        let mut audit = AuditRecord::new("SYNC_CHECK");
        audit.success = record.status != "ERROR";
        audit.error_message = record.error_message.clone();
        audit.duration_ms = record.check_duration_ms;
        audit.metadata = Some(serde_json::json!({
            "status": record.status,
            "totalDiscrepancy": record.total_discrepancy(),
        }));
        self.audit.record(&audit);

        info!(
            status = %record.status,
            discrepancy = record.total_discrepancy(),
            "sync check finished"
        );
        Ok(record)
    }

    fn db_country_stats(&self) -> Result<serde_json::Value, Error> {
        let mut stats = serde_json::Map::new();
        for cert_type in CertType::ALL {
            let counts = self.certificates.country_counts(cert_type)?;
            stats.insert(
                cert_type.as_str().to_string(),
                serde_json::to_value(counts).unwrap_or_default(),
            );
        }
        stats.insert(
            "CRL".to_string(),
            serde_json::to_value(self.crls.country_counts()?).unwrap_or_default(),
        );
        Ok(serde_json::Value::Object(stats))
    }

    /// Re-evaluate every stored certificate: validity window for all,
    /// revocation for document signers. Per-certificate failures are
    /// logged and counted, never fatal to the pass.
    pub fn run_revalidation(
        &self,
        gateway: &DirectoryGateway,
        triggered_by: &str,
    ) -> Result<RevalidationRun, Error> {
        const PAGE_SIZE: i64 = 200;
        let started = Instant::now();
        let now = Utc::now();
        let validator = ChainValidator::new();
        info!(triggered_by, "starting certificate revalidation pass");

        let mut session = gateway.session().ok();
        let mut run = RevalidationRun {
            triggered_by: triggered_by.to_string(),
            ..RevalidationRun::default()
        };

        let mut offset = 0;
        loop {
            let page = self.certificates.page(PAGE_SIZE, offset)?;
            if page.is_empty() {
                break;
            }
            offset += page.len() as i64;

            for record in &page {
                run.total_count += 1;
                let info = match CertificateInfo::from_der(&record.der) {
                    Ok(info) => info,
                    Err(parse_error) => {
                        warn!(id = %record.id, %parse_error, "stored certificate does not parse");
                        run.failed_count += 1;
                        continue;
                    }
                };

                let state = info.validity_state(now);
                let status = match state {
                    crate::x509::ValidityState::Valid => {
                        run.valid_count += 1;
                        crate::store::ValidationStatus::Valid
                    }
                    crate::x509::ValidityState::Expired => {
                        run.expired_count += 1;
                        crate::store::ValidationStatus::Expired
                    }
                    crate::x509::ValidityState::NotYetValid => {
                        crate::store::ValidationStatus::NotYetValid
                    }
                };
                if let Err(store_error) = self.certificates.set_validation_status(&record.id, status)
                {
                    warn!(id = %record.id, %store_error, "validation status update failed");
                    run.failed_count += 1;
                    continue;
                }

                // Document signers additionally get a fresh chain and CRL
                // verdict when the directory is reachable.
                if record.cert_type == CertType::Dsc {
                    if let Some(session) = session.as_mut() {
                        let chain = validator.validate(
                            &info,
                            Some(record.country_code.as_str()),
                            None,
                            session,
                        );
                        let outcome = ValidationOutcomeRow {
                            certificate_id:        record.id.clone(),
                            trust_chain_valid:     chain.chain_valid,
                            csca_found:            chain.csca_found,
                            validity_period_valid: state == crate::x509::ValidityState::Valid,
                            revocation_status:     match chain.crl_status {
                                crate::pa::CrlStatus::Valid => RevocationStatus::Good,
                                crate::pa::CrlStatus::Revoked => RevocationStatus::Revoked,
                                _ => RevocationStatus::Unknown,
                            },
                        };
                        if let Err(store_error) =
                            self.certificates.write_validation_result(&outcome)
                        {
                            warn!(id = %record.id, %store_error, "validation result write failed");
                        }
                    }
                }
            }
        }

        run.duration_ms = started.elapsed().as_millis() as i64;
        self.versions.record_revalidation(&run)?;

        let mut audit = AuditRecord::new("REVALIDATE_CERTS");
        audit.success = true;
        audit.duration_ms = run.duration_ms;
        audit.metadata = Some(serde_json::json!({
            "total": run.total_count,
            "valid": run.valid_count,
            "expired": run.expired_count,
            "failed": run.failed_count,
        }));
        self.audit.record(&audit);

        info!(
            total = run.total_count,
            valid = run.valid_count,
            expired = run.expired_count,
            failed = run.failed_count,
            "revalidation pass finished"
        );
        Ok(run)
    }
}
