//! Reconciliation summaries and per-operation log rows.

use {
    super::{executor::Row, QueryExecutor, StoreError},
    chrono::{DateTime, Utc},
    serde::Serialize,
    std::sync::Arc,
};

#[derive(Clone, Debug, Serialize)]
pub struct ReconciliationSummaryRow {
    pub id:            String,
    pub sync_status_id: Option<String>,
    pub triggered_by:  String,
    pub dry_run:       bool,
    pub csca_added:    i64,
    pub mlsc_added:    i64,
    pub dsc_added:     i64,
    pub crl_added:     i64,
    pub success_count: i64,
    pub failed_count:  i64,
    pub duration_ms:   i64,
    pub status:        String,
    pub error_message: Option<String>,
    #[serde(skip)]
    pub started_at:    Option<DateTime<Utc>>,
}

/// One add/delete attempt against the directory.
#[derive(Clone, Debug, Serialize)]
pub struct ReconOpRow {
    pub summary_id:         String,
    pub operation:          String,
    pub certificate_type:   Option<String>,
    pub fingerprint_sha256: Option<String>,
    pub country_code:       Option<String>,
    pub ldap_dn:            Option<String>,
    pub result:             String,
    pub error_message:      Option<String>,
    pub duration_ms:        i64,
}

#[derive(Clone)]
pub struct ReconciliationStore {
    executor: Arc<dyn QueryExecutor>,
}

impl ReconciliationStore {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Open a summary in `IN_PROGRESS` state; returns its id.
    pub fn open_summary(
        &self,
        triggered_by: &str,
        sync_status_id: Option<&str>,
        dry_run: bool,
    ) -> Result<String, StoreError> {
        let dialect = self.executor.dialect();
        let id = dialect.generate_id();
        let sql = format!(
            "INSERT INTO reconciliation_summary (id, sync_status_id, triggered_by, dry_run, \
             status, started_at) VALUES ($1, $2, $3, $4, 'IN_PROGRESS', {now})",
            now = dialect.current_timestamp(),
        );
        self.executor.execute(&sql, &[
            id.clone().into(),
            sync_status_id.map(str::to_string).into(),
            triggered_by.into(),
            dry_run.into(),
        ])?;
        Ok(id)
    }

    /// Close a summary with final counters and status.
    #[allow(clippy::too_many_arguments)]
    pub fn close_summary(
        &self,
        id: &str,
        counters: &ReconciliationSummaryRow,
    ) -> Result<(), StoreError> {
        let dialect = self.executor.dialect();
        let sql = format!(
            "UPDATE reconciliation_summary SET csca_added = $1, mlsc_added = $2, \
             dsc_added = $3, crl_added = $4, success_count = $5, failed_count = $6, \
             duration_ms = $7, status = $8, error_message = $9, finished_at = {now} \
             WHERE id = $10",
            now = dialect.current_timestamp(),
        );
        self.executor.execute(&sql, &[
            counters.csca_added.into(),
            counters.mlsc_added.into(),
            counters.dsc_added.into(),
            counters.crl_added.into(),
            counters.success_count.into(),
            counters.failed_count.into(),
            counters.duration_ms.into(),
            counters.status.clone().into(),
            counters.error_message.clone().into(),
            id.into(),
        ])?;
        Ok(())
    }

    pub fn log_operation(&self, op: &ReconOpRow) -> Result<(), StoreError> {
        let dialect = self.executor.dialect();
        let sql = format!(
            "INSERT INTO reconciliation_log (id, summary_id, operation, certificate_type, \
             fingerprint_sha256, country_code, ldap_dn, result, error_message, duration_ms, \
             logged_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, {now})",
            now = dialect.current_timestamp(),
        );
        self.executor.execute(&sql, &[
            dialect.generate_id().into(),
            op.summary_id.clone().into(),
            op.operation.clone().into(),
            op.certificate_type.clone().into(),
            op.fingerprint_sha256.clone().into(),
            op.country_code.clone().into(),
            op.ldap_dn.clone().into(),
            op.result.clone().into(),
            op.error_message.clone().into(),
            op.duration_ms.into(),
        ])?;
        Ok(())
    }

    pub fn find_summary(&self, id: &str) -> Result<Option<ReconciliationSummaryRow>, StoreError> {
        let rows = self.executor.query(
            "SELECT id, sync_status_id, triggered_by, dry_run, csca_added, mlsc_added, \
             dsc_added, crl_added, success_count, failed_count, duration_ms, status, \
             error_message, started_at FROM reconciliation_summary WHERE id = $1",
            &[id.into()],
        )?;
        rows.first().map(map_summary).transpose()
    }

    pub fn operations(&self, summary_id: &str) -> Result<Vec<ReconOpRow>, StoreError> {
        let rows = self.executor.query(
            "SELECT summary_id, operation, certificate_type, fingerprint_sha256, \
             country_code, ldap_dn, result, error_message, duration_ms \
             FROM reconciliation_log WHERE summary_id = $1 ORDER BY logged_at",
            &[summary_id.into()],
        )?;
        rows.iter()
            .map(|row| {
                Ok(ReconOpRow {
                    summary_id:         row.text("summary_id")?,
                    operation:          row.text("operation")?,
                    certificate_type:   row.opt_text("certificate_type"),
                    fingerprint_sha256: row.opt_text("fingerprint_sha256"),
                    country_code:       row.opt_text("country_code"),
                    ldap_dn:            row.opt_text("ldap_dn"),
                    result:             row.text("result")?,
                    error_message:      row.opt_text("error_message"),
                    duration_ms:        row.int("duration_ms")?,
                })
            })
            .collect()
    }
}

fn map_summary(row: &Row) -> Result<ReconciliationSummaryRow, StoreError> {
    Ok(ReconciliationSummaryRow {
        id:            row.text("id")?,
        sync_status_id: row.opt_text("sync_status_id"),
        triggered_by:  row.text("triggered_by")?,
        dry_run:       row.bool("dry_run")?,
        csca_added:    row.int("csca_added")?,
        mlsc_added:    row.int("mlsc_added")?,
        dsc_added:     row.int("dsc_added")?,
        crl_added:     row.int("crl_added")?,
        success_count: row.int("success_count")?,
        failed_count:  row.int("failed_count")?,
        duration_ms:   row.int("duration_ms")?,
        status:        row.text("status")?,
        error_message: row.opt_text("error_message"),
        started_at:    row.opt_datetime("started_at"),
    })
}
