//! One-way DB → LDAP reconciliation.
//!
//! The directory is never the source of truth: missing entries are
//! re-published from the store, nothing flows back. Every attempt emits a
//! log row; the summary opens `IN_PROGRESS` and closes with the final
//! counters. `DSC_NC` is ingested and searchable but no longer reconciled
//! outbound (ICAO stopped publishing it as a live dataset).

use {
    crate::{
        error::Error,
        ldap::{DirectoryGateway, DirectorySession},
        store::{
            AuditLogStore, AuditRecord, CertType, CertificateStore, CrlStore, ReconOpRow,
            ReconciliationStore, ReconciliationSummaryRow,
        },
    },
    std::time::Instant,
    tracing::{info, warn},
};

/// Types reconciled outbound, in processing order.
const OUTBOUND_TYPES: [CertType; 3] = [CertType::Csca, CertType::Mlsc, CertType::Dsc];

#[derive(Clone, Debug)]
pub struct ReconcileOptions {
    pub dry_run:        bool,
    pub triggered_by:   String,
    pub sync_status_id: Option<String>,
    pub max_batch_size: i64,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dry_run:        false,
            triggered_by:   "MANUAL".to_string(),
            sync_status_id: None,
            max_batch_size: 500,
        }
    }
}

pub struct ReconciliationEngine {
    certificates: CertificateStore,
    crls:         CrlStore,
    log:          ReconciliationStore,
    audit:        AuditLogStore,
}

struct RunCounters {
    summary: ReconciliationSummaryRow,
}

impl ReconciliationEngine {
    pub fn new(
        certificates: CertificateStore,
        crls: CrlStore,
        log: ReconciliationStore,
        audit: AuditLogStore,
    ) -> Self {
        Self {
            certificates,
            crls,
            log,
            audit,
        }
    }

    /// Run one reconciliation pass. Idempotent: a second consecutive run
    /// adds zero entries.
    pub fn reconcile(
        &self,
        gateway: &DirectoryGateway,
        options: &ReconcileOptions,
    ) -> Result<ReconciliationSummaryRow, Error> {
        let started = Instant::now();
        info!(
            dry_run = options.dry_run,
            triggered_by = %options.triggered_by,
            "starting reconciliation"
        );

        let summary_id = self.log.open_summary(
            &options.triggered_by,
            options.sync_status_id.as_deref(),
            options.dry_run,
        )?;
        let mut counters = RunCounters {
            summary: ReconciliationSummaryRow {
                id: summary_id.clone(),
                sync_status_id: options.sync_status_id.clone(),
                triggered_by: options.triggered_by.clone(),
                dry_run: options.dry_run,
                csca_added: 0,
                mlsc_added: 0,
                dsc_added: 0,
                crl_added: 0,
                success_count: 0,
                failed_count: 0,
                duration_ms: 0,
                status: "COMPLETED".to_string(),
                error_message: None,
                started_at: None,
            },
        };

        let mut session = match gateway.session() {
            Ok(session) => session,
            Err(directory_error) => {
                counters.summary.status = "FAILED".to_string();
                counters.summary.error_message = Some(directory_error.to_string());
                counters.summary.duration_ms = started.elapsed().as_millis() as i64;
                self.log.close_summary(&summary_id, &counters.summary)?;
                self.audit_run(&counters.summary);
                return Ok(counters.summary);
            }
        };

        for cert_type in OUTBOUND_TYPES {
            self.reconcile_certificates(&mut session, cert_type, options, &mut counters)?;
        }
        self.reconcile_crls(&mut session, options, &mut counters)?;

        counters.summary.duration_ms = started.elapsed().as_millis() as i64;
        counters.summary.status = final_status(&counters.summary);
        self.log.close_summary(&summary_id, &counters.summary)?;
        self.audit_run(&counters.summary);

        info!(
            status = %counters.summary.status,
            succeeded = counters.summary.success_count,
            failed = counters.summary.failed_count,
            duration_ms = counters.summary.duration_ms,
            "reconciliation finished"
        );
        Ok(counters.summary)
    }

    fn reconcile_certificates(
        &self,
        session: &mut DirectorySession<'_>,
        cert_type: CertType,
        options: &ReconcileOptions,
        counters: &mut RunCounters,
    ) -> Result<(), Error> {
        let candidates = self
            .certificates
            .find_missing_in_ldap(cert_type, options.max_batch_size)?;
        info!(
            cert_type = cert_type.as_str(),
            count = candidates.len(),
            "certificates pending directory publication"
        );

        for record in candidates {
            let dn = session.gateway().certificate_dn(
                record.cert_type,
                &record.country_code,
                &record.fingerprint_sha256,
            );

            // SCOPE_BASE probe: an entry that already exists only needs
            // its flag repaired, no mutation and no log row.
            match session.entry_exists(&dn) {
                Ok(true) => {
                    if !options.dry_run {
                        self.certificates.mark_stored_in_ldap(&record.id)?;
                    }
                    continue;
                }
                Ok(false) => {}
                Err(directory_error) => {
                    self.log_operation(counters, ReconOpRow {
                        summary_id:         counters.summary.id.clone(),
                        operation:          "ADD".to_string(),
                        certificate_type:   Some(record.cert_type.as_str().to_string()),
                        fingerprint_sha256: Some(record.fingerprint_sha256.clone()),
                        country_code:       Some(record.country_code.clone()),
                        ldap_dn:            Some(dn.clone()),
                        result:             "FAILED".to_string(),
                        error_message:      Some(directory_error.to_string()),
                        duration_ms:        0,
                    });
                    continue;
                }
            }

            if options.dry_run {
                info!(%dn, "[dry-run] would add certificate");
                self.log_dry_run(counters, &record.cert_type, &record, &dn);
                continue;
            }

            let op_started = Instant::now();
            match session.add_certificate(&record) {
                Ok(_) => {
                    self.certificates.mark_stored_in_ldap(&record.id)?;
                    match cert_type {
                        CertType::Csca => counters.summary.csca_added += 1,
                        CertType::Mlsc => counters.summary.mlsc_added += 1,
                        _ => counters.summary.dsc_added += 1,
                    }
                    counters.summary.success_count += 1;
                    self.log.log_operation(&ReconOpRow {
                        summary_id:         counters.summary.id.clone(),
                        operation:          "ADD".to_string(),
                        certificate_type:   Some(record.cert_type.as_str().to_string()),
                        fingerprint_sha256: Some(record.fingerprint_sha256.clone()),
                        country_code:       Some(record.country_code.clone()),
                        ldap_dn:            Some(dn),
                        result:             "SUCCESS".to_string(),
                        error_message:      None,
                        duration_ms:        op_started.elapsed().as_millis() as i64,
                    })?;
                }
                Err(directory_error) => {
                    warn!(%directory_error, subject = %record.subject_dn, "directory add failed");
                    self.log_operation(counters, ReconOpRow {
                        summary_id:         counters.summary.id.clone(),
                        operation:          "ADD".to_string(),
                        certificate_type:   Some(record.cert_type.as_str().to_string()),
                        fingerprint_sha256: Some(record.fingerprint_sha256.clone()),
                        country_code:       Some(record.country_code.clone()),
                        ldap_dn:            Some(dn),
                        result:             "FAILED".to_string(),
                        error_message:      Some(directory_error.to_string()),
                        duration_ms:        op_started.elapsed().as_millis() as i64,
                    });
                }
            }
        }
        Ok(())
    }

    fn reconcile_crls(
        &self,
        session: &mut DirectorySession<'_>,
        options: &ReconcileOptions,
        counters: &mut RunCounters,
    ) -> Result<(), Error> {
        let candidates = self.crls.find_missing_in_ldap(options.max_batch_size)?;
        info!(count = candidates.len(), "CRLs pending directory publication");

        for record in candidates {
            let dn = session
                .gateway()
                .crl_dn(&record.country_code, &record.fingerprint_sha256);

            if options.dry_run {
                info!(%dn, "[dry-run] would add CRL");
                self.log_operation(counters, ReconOpRow {
                    summary_id:         counters.summary.id.clone(),
                    operation:          "ADD".to_string(),
                    certificate_type:   Some("CRL".to_string()),
                    fingerprint_sha256: Some(record.fingerprint_sha256.clone()),
                    country_code:       Some(record.country_code.clone()),
                    ldap_dn:            Some(dn),
                    result:             "DRY_RUN".to_string(),
                    error_message:      None,
                    duration_ms:        0,
                });
                continue;
            }

            let op_started = Instant::now();
            match session.add_crl(&record) {
                Ok(_) => {
                    self.crls.mark_stored_in_ldap(&record.id)?;
                    counters.summary.crl_added += 1;
                    counters.summary.success_count += 1;
                    self.log.log_operation(&ReconOpRow {
                        summary_id:         counters.summary.id.clone(),
                        operation:          "ADD".to_string(),
                        certificate_type:   Some("CRL".to_string()),
                        fingerprint_sha256: Some(record.fingerprint_sha256.clone()),
                        country_code:       Some(record.country_code.clone()),
                        ldap_dn:            Some(dn),
                        result:             "SUCCESS".to_string(),
                        error_message:      None,
                        duration_ms:        op_started.elapsed().as_millis() as i64,
                    })?;
                }
                Err(directory_error) => {
                    warn!(%directory_error, country = %record.country_code, "CRL add failed");
                    self.log_operation(counters, ReconOpRow {
                        summary_id:         counters.summary.id.clone(),
                        operation:          "ADD".to_string(),
                        certificate_type:   Some("CRL".to_string()),
                        fingerprint_sha256: Some(record.fingerprint_sha256.clone()),
                        country_code:       Some(record.country_code.clone()),
                        ldap_dn:            Some(dn),
                        result:             "FAILED".to_string(),
                        error_message:      Some(directory_error.to_string()),
                        duration_ms:        op_started.elapsed().as_millis() as i64,
                    });
                }
            }
        }
        Ok(())
    }

    fn log_dry_run(
        &self,
        counters: &mut RunCounters,
        cert_type: &CertType,
        record: &crate::store::CertificateRecord,
        dn: &str,
    ) {
        self.log_operation(counters, ReconOpRow {
            summary_id:         counters.summary.id.clone(),
            operation:          "ADD".to_string(),
            certificate_type:   Some(cert_type.as_str().to_string()),
            fingerprint_sha256: Some(record.fingerprint_sha256.clone()),
            country_code:       Some(record.country_code.clone()),
            ldap_dn:            Some(dn.to_string()),
            result:             "DRY_RUN".to_string(),
            error_message:      None,
            duration_ms:        0,
        });
    }

    /// Failure-path logging: a log row that cannot be written must not
    /// abort the run.
    fn log_operation(&self, counters: &mut RunCounters, op: ReconOpRow) {
        if op.result == "FAILED" {
            counters.summary.failed_count += 1;
        }
        if let Err(store_error) = self.log.log_operation(&op) {
            warn!(%store_error, "reconciliation log write failed");
        }
    }

    fn audit_run(&self, summary: &ReconciliationSummaryRow) {
        let mut audit = AuditRecord::new("RECONCILE");
        audit.success = summary.status != "FAILED";
        audit.duration_ms = summary.duration_ms;
        audit.error_message = summary.error_message.clone();
        audit.metadata = Some(serde_json::json!({
            "status": summary.status,
            "dryRun": summary.dry_run,
            "succeeded": summary.success_count,
            "failed": summary.failed_count,
            "triggeredBy": summary.triggered_by,
        }));
        self.audit.record(&audit);
    }
}

fn final_status(summary: &ReconciliationSummaryRow) -> String {
    if summary.failed_count == 0 {
        "COMPLETED".to_string()
    } else if summary.success_count == 0 {
        "FAILED".to_string()
    } else {
        "PARTIAL".to_string()
    }
}
