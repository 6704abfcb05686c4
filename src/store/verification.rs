//! PA verification records and per-data-group results.
//!
//! Verification rows are written once at the end of a PA run and never
//! mutated afterwards.

use {
    super::{executor::Row, QueryExecutor, SqlValue, StoreError},
    chrono::{DateTime, Utc},
    serde::Serialize,
    std::sync::Arc,
};

#[derive(Clone, Debug, Serialize)]
pub struct PaVerificationRecord {
    pub id:                  String,
    pub issuing_country:     String,
    pub document_number:     Option<String>,
    #[serde(skip)]
    pub sod_binary:          Vec<u8>,
    pub sod_hash:            String,
    pub verification_status: String,
    pub dsc_subject:         Option<String>,
    pub dsc_serial_number:   Option<String>,
    pub dsc_issuer:          Option<String>,
    pub dsc_expired:         bool,
    pub csca_subject:        Option<String>,
    pub csca_serial_number:  Option<String>,
    pub csca_expired:        bool,
    pub trust_chain_valid:   bool,
    pub sod_signature_valid: bool,
    pub dg_hashes_valid:     bool,
    pub crl_checked:         bool,
    pub revoked:             bool,
    pub crl_status:          Option<String>,
    pub expiration_status:   Option<String>,
    pub validation_errors:   Option<String>,
    pub ip_address:          Option<String>,
    pub user_agent:          Option<String>,
    pub processing_time_ms:  i64,
    #[serde(skip)]
    pub request_timestamp:   Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DataGroupRow {
    pub verification_id: String,
    pub dg_number:       i64,
    pub expected_hash:   Option<String>,
    pub actual_hash:     Option<String>,
    pub hash_algorithm:  Option<String>,
    pub hash_valid:      bool,
    #[serde(skip)]
    pub dg_binary:       Option<Vec<u8>>,
}

#[derive(Clone)]
pub struct VerificationStore {
    executor: Arc<dyn QueryExecutor>,
}

const SELECT_COLUMNS: &str = "id, issuing_country, document_number, sod_binary, sod_hash, \
                              verification_status, dsc_subject, dsc_serial_number, dsc_issuer, \
                              dsc_expired, csca_subject, csca_serial_number, csca_expired, \
                              trust_chain_valid, sod_signature_valid, dg_hashes_valid, \
                              crl_checked, revoked, crl_status, expiration_status, \
                              validation_errors, ip_address, user_agent, processing_time_ms, \
                              request_timestamp";

impl VerificationStore {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Persist a verification and its per-data-group rows; returns the
    /// generated verification id.
    pub fn insert(
        &self,
        record: &PaVerificationRecord,
        data_groups: &[DataGroupRow],
    ) -> Result<String, StoreError> {
        let dialect = self.executor.dialect();
        let id = dialect.generate_id();
        let sql = format!(
            "INSERT INTO pa_verification (id, issuing_country, document_number, sod_binary, \
             sod_hash, verification_status, dsc_subject, dsc_serial_number, dsc_issuer, \
             dsc_expired, csca_subject, csca_serial_number, csca_expired, trust_chain_valid, \
             sod_signature_valid, dg_hashes_valid, crl_checked, revoked, crl_status, \
             expiration_status, validation_errors, ip_address, user_agent, \
             processing_time_ms, request_timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22, $23, $24, {now})",
            now = dialect.current_timestamp(),
        );
        self.executor.execute(&sql, &[
            id.clone().into(),
            record.issuing_country.clone().into(),
            record.document_number.clone().into(),
            record.sod_binary.clone().into(),
            record.sod_hash.clone().into(),
            record.verification_status.clone().into(),
            record.dsc_subject.clone().into(),
            record.dsc_serial_number.clone().into(),
            record.dsc_issuer.clone().into(),
            record.dsc_expired.into(),
            record.csca_subject.clone().into(),
            record.csca_serial_number.clone().into(),
            record.csca_expired.into(),
            record.trust_chain_valid.into(),
            record.sod_signature_valid.into(),
            record.dg_hashes_valid.into(),
            record.crl_checked.into(),
            record.revoked.into(),
            record.crl_status.clone().into(),
            record.expiration_status.clone().into(),
            record.validation_errors.clone().into(),
            record.ip_address.clone().into(),
            record.user_agent.clone().into(),
            record.processing_time_ms.into(),
        ])?;

        for dg in data_groups {
            self.executor.execute(
                "INSERT INTO pa_data_group (id, verification_id, dg_number, expected_hash, \
                 actual_hash, hash_algorithm, hash_valid, dg_binary) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    dialect.generate_id().into(),
                    id.clone().into(),
                    dg.dg_number.into(),
                    dg.expected_hash.clone().into(),
                    dg.actual_hash.clone().into(),
                    dg.hash_algorithm.clone().into(),
                    dg.hash_valid.into(),
                    dg.dg_binary
                        .clone()
                        .map_or(SqlValue::Null, Into::into),
                ],
            )?;
        }
        Ok(id)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<PaVerificationRecord>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM pa_verification WHERE id = $1");
        let rows = self.executor.query(&sql, &[id.into()])?;
        rows.first().map(map_verification).transpose()
    }

    /// Paginated history, newest first, optionally filtered by status and
    /// issuing country.
    pub fn find_all(
        &self,
        limit: i64,
        offset: i64,
        status: Option<&str>,
        country: Option<&str>,
    ) -> Result<Vec<PaVerificationRecord>, StoreError> {
        let mut conditions = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();
        if let Some(status) = status {
            params.push(status.into());
            conditions.push(format!("verification_status = ${}", params.len()));
        }
        if let Some(country) = country {
            params.push(country.to_uppercase().into());
            conditions.push(format!("issuing_country = ${}", params.len()));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {} ", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM pa_verification {where_clause}\
             ORDER BY request_timestamp DESC {page}",
            page = self.executor.dialect().pagination_clause(limit, offset),
        );
        let rows = self.executor.query(&sql, &params)?;
        rows.iter().map(map_verification).collect()
    }

    pub fn data_groups(&self, verification_id: &str) -> Result<Vec<DataGroupRow>, StoreError> {
        let rows = self.executor.query(
            "SELECT verification_id, dg_number, expected_hash, actual_hash, hash_algorithm, \
             hash_valid, dg_binary FROM pa_data_group \
             WHERE verification_id = $1 ORDER BY dg_number",
            &[verification_id.into()],
        )?;
        rows.iter()
            .map(|row| {
                Ok(DataGroupRow {
                    verification_id: row.text("verification_id")?,
                    dg_number: row.int("dg_number")?,
                    expected_hash: row.opt_text("expected_hash"),
                    actual_hash: row.opt_text("actual_hash"),
                    hash_algorithm: row.opt_text("hash_algorithm"),
                    hash_valid: row.bool("hash_valid")?,
                    dg_binary: row.blob("dg_binary").ok(),
                })
            })
            .collect()
    }

    /// Counters per verification status, for the statistics endpoint.
    pub fn statistics(&self) -> Result<serde_json::Value, StoreError> {
        let rows = self.executor.query(
            "SELECT verification_status, COUNT(*) AS cnt FROM pa_verification \
             GROUP BY verification_status",
            &[],
        )?;
        let mut total = 0i64;
        let mut by_status = serde_json::Map::new();
        for row in &rows {
            let count = row.int("cnt")?;
            total += count;
            by_status.insert(row.text("verification_status")?, count.into());
        }
        Ok(serde_json::json!({ "total": total, "byStatus": by_status }))
    }
}

fn map_verification(row: &Row) -> Result<PaVerificationRecord, StoreError> {
    Ok(PaVerificationRecord {
        id: row.text("id")?,
        issuing_country: row.text("issuing_country")?,
        document_number: row.opt_text("document_number"),
        sod_binary: row.blob("sod_binary").unwrap_or_default(),
        sod_hash: row.text("sod_hash")?,
        verification_status: row.text("verification_status")?,
        dsc_subject: row.opt_text("dsc_subject"),
        dsc_serial_number: row.opt_text("dsc_serial_number"),
        dsc_issuer: row.opt_text("dsc_issuer"),
        dsc_expired: row.bool("dsc_expired")?,
        csca_subject: row.opt_text("csca_subject"),
        csca_serial_number: row.opt_text("csca_serial_number"),
        csca_expired: row.bool("csca_expired")?,
        trust_chain_valid: row.bool("trust_chain_valid")?,
        sod_signature_valid: row.bool("sod_signature_valid")?,
        dg_hashes_valid: row.bool("dg_hashes_valid")?,
        crl_checked: row.bool("crl_checked")?,
        revoked: row.bool("revoked")?,
        crl_status: row.opt_text("crl_status"),
        expiration_status: row.opt_text("expiration_status"),
        validation_errors: row.opt_text("validation_errors"),
        ip_address: row.opt_text("ip_address"),
        user_agent: row.opt_text("user_agent"),
        processing_time_ms: row.int("processing_time_ms").unwrap_or(0),
        request_timestamp: row.opt_datetime("request_timestamp"),
    })
}
