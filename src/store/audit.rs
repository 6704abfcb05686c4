//! Append-only audit log for externally triggered operations.
//!
//! Audit writes are best-effort: a failed insert is logged and swallowed so
//! it can never fail the operation being audited.

use {
    super::{QueryExecutor, StoreError},
    std::sync::Arc,
    tracing::warn,
};

/// One audited operation.
#[derive(Clone, Debug, Default)]
pub struct AuditRecord {
    pub operation:     String,
    pub subject:       Option<String>,
    pub ip_address:    Option<String>,
    pub success:       bool,
    pub error_message: Option<String>,
    pub duration_ms:   i64,
    pub metadata:      Option<serde_json::Value>,
}

impl AuditRecord {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            success: true,
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct AuditLogStore {
    executor: Arc<dyn QueryExecutor>,
}

impl AuditLogStore {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Record an operation. Never fails; insert errors are logged.
    pub fn record(&self, record: &AuditRecord) {
        if let Err(error) = self.try_record(record) {
            warn!(operation = %record.operation, %error, "audit write failed");
        }
    }

    fn try_record(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let dialect = self.executor.dialect();
        let sql = format!(
            "INSERT INTO operation_audit_log (id, operation, subject, ip_address, success, \
             error_message, duration_ms, metadata, logged_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, {now})",
            now = dialect.current_timestamp(),
        );
        self.executor.execute(&sql, &[
            dialect.generate_id().into(),
            record.operation.clone().into(),
            record.subject.clone().into(),
            record.ip_address.clone().into(),
            record.success.into(),
            record.error_message.clone().into(),
            record.duration_ms.into(),
            record
                .metadata
                .as_ref()
                .map(ToString::to_string)
                .into(),
        ])?;
        Ok(())
    }

    /// Recent audit rows, newest first.
    pub fn recent(&self, limit: i64) -> Result<Vec<AuditRecord>, StoreError> {
        let sql = format!(
            "SELECT operation, subject, ip_address, success, error_message, duration_ms, \
             metadata FROM operation_audit_log ORDER BY logged_at DESC {limit}",
            limit = self.executor.dialect().limit_clause(limit),
        );
        let rows = self.executor.query(&sql, &[])?;
        rows.iter()
            .map(|row| {
                Ok(AuditRecord {
                    operation:     row.text("operation")?,
                    subject:       row.opt_text("subject"),
                    ip_address:    row.opt_text("ip_address"),
                    success:       row.bool("success")?,
                    error_message: row.opt_text("error_message"),
                    duration_ms:   row.int("duration_ms")?,
                    metadata:      row
                        .opt_text("metadata")
                        .and_then(|text| serde_json::from_str(&text).ok()),
                })
            })
            .collect()
    }
}
