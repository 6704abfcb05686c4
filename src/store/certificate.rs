//! Certificate repository and duplicate ledger.
//!
//! Certificates are content-addressed: `(certificate_type,
//! fingerprint_sha256)` is unique, and a repeated import of the same DER is
//! a duplicate sighting, never a second row. The first upload of a
//! fingerprint owns `first_upload_id`; later sightings only append to the
//! ledger.

use {
    super::{
        executor::Row, CertType, Conformance, QueryExecutor, RevocationStatus, SourceType,
        SqlValue, StoreError, ValidationStatus,
    },
    crate::x509::{normalize_dn, CertificateInfo},
    chrono::{DateTime, Utc},
    std::{collections::HashMap, sync::Arc},
    tracing::{debug, info},
};

#[derive(Clone, Debug)]
pub struct CertificateRecord {
    pub id:                   String,
    pub cert_type:            CertType,
    pub country_code:         String,
    pub subject_dn:           String,
    pub issuer_dn:            String,
    pub serial_number:        String,
    pub fingerprint_sha256:   String,
    pub not_before:           DateTime<Utc>,
    pub not_after:            DateTime<Utc>,
    pub der:                  Vec<u8>,
    pub signature_algorithm:  Option<String>,
    pub public_key_algorithm: Option<String>,
    pub public_key_bits:      i64,
    pub is_self_signed:       bool,
    pub stored_in_ldap:       bool,
    pub conformance:          Conformance,
    pub source_type:          SourceType,
    pub first_upload_id:      Option<String>,
    pub validation_status:    ValidationStatus,
}

/// Insert payload for [`CertificateStore::put`].
#[derive(Clone, Debug)]
pub struct NewCertificate {
    pub cert_type:            CertType,
    pub country_code:         String,
    pub subject_dn:           String,
    pub issuer_dn:            String,
    pub serial_number:        String,
    pub fingerprint_sha256:   String,
    pub not_before:           DateTime<Utc>,
    pub not_after:            DateTime<Utc>,
    pub der:                  Vec<u8>,
    pub signature_algorithm:  String,
    pub public_key_algorithm: String,
    pub public_key_bits:      i64,
    pub is_self_signed:       bool,
    pub conformance:          Conformance,
    pub source_type:          SourceType,
    pub first_upload_id:      Option<String>,
    pub validation_status:    ValidationStatus,
}

impl NewCertificate {
    /// Build an insert payload from parsed metadata. The country is taken
    /// from the subject for CSCA/MLSC and from the issuer for DSCs, with
    /// an optional caller override.
    pub fn from_parsed(
        cert_type: CertType,
        info: &CertificateInfo,
        source_type: SourceType,
        country_override: Option<&str>,
    ) -> Self {
        let country_code = country_override
            .map(crate::country::normalize_to_alpha2)
            .or_else(|| info.country_for_kind(cert_type.is_self_issued_kind()))
            .unwrap_or_else(|| "XX".to_string());
        let conformance = if cert_type == CertType::DscNc {
            Conformance::NonConformant
        } else {
            Conformance::Conformant
        };
        Self {
            cert_type,
            country_code,
            subject_dn: info.subject_dn.clone(),
            issuer_dn: info.issuer_dn.clone(),
            serial_number: info.serial_number.clone(),
            fingerprint_sha256: info.fingerprint_sha256.clone(),
            not_before: info.not_before,
            not_after: info.not_after,
            der: info.der.clone(),
            signature_algorithm: info.signature_algorithm.clone(),
            public_key_algorithm: info.public_key_algorithm.clone(),
            public_key_bits: i64::from(info.public_key_bits),
            is_self_signed: info.is_self_signed,
            conformance,
            source_type,
            first_upload_id: None,
            validation_status: ValidationStatus::Unknown,
        }
    }
}

/// Provenance of one duplicate sighting.
#[derive(Clone, Debug, Default)]
pub struct SightingMeta {
    pub upload_id:        Option<String>,
    pub source_type:      Option<String>,
    pub source_country:   Option<String>,
    pub source_entry_dn:  Option<String>,
    pub source_file_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// New row; carries the generated id.
    Inserted(String),
    /// Fingerprint already present; a sighting was recorded and the
    /// existing id returned.
    Duplicate(String),
}

impl PutOutcome {
    pub fn id(&self) -> &str {
        match self {
            Self::Inserted(id) | Self::Duplicate(id) => id,
        }
    }
}

/// Chain validator output materialized per certificate.
#[derive(Clone, Debug)]
pub struct ValidationOutcomeRow {
    pub certificate_id:        String,
    pub trust_chain_valid:     bool,
    pub csca_found:            bool,
    pub validity_period_valid: bool,
    pub revocation_status:     RevocationStatus,
}

#[derive(Clone)]
pub struct CertificateStore {
    executor: Arc<dyn QueryExecutor>,
}

const SELECT_COLUMNS: &str = "id, certificate_type, country_code, subject_dn, issuer_dn, \
                              serial_number, fingerprint_sha256, not_before, not_after, \
                              certificate_data, validation_status, stored_in_ldap, \
                              is_self_signed, signature_algorithm, public_key_algorithm, \
                              public_key_size, conformance, source_type, first_upload_id";

impl CertificateStore {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Upsert by `(type, fingerprint)`: insert when absent, otherwise
    /// record a duplicate sighting against the existing row.
    ///
    /// A concurrent insert racing on the unique constraint collapses to
    /// the duplicate path; the constraint violation is not an error.
    pub fn put(
        &self,
        cert: &NewCertificate,
        sighting: &SightingMeta,
    ) -> Result<PutOutcome, StoreError> {
        if let Some(existing) =
            self.get_by_fingerprint(cert.cert_type, &cert.fingerprint_sha256)?
        {
            self.record_sighting(&existing.id, sighting)?;
            debug!(
                fingerprint = %cert.fingerprint_sha256,
                "duplicate certificate sighting recorded"
            );
            return Ok(PutOutcome::Duplicate(existing.id));
        }

        let dialect = self.executor.dialect();
        let id = dialect.generate_id();
        let sql = format!(
            "INSERT INTO certificate (id, certificate_type, country_code, subject_dn, \
             issuer_dn, serial_number, fingerprint_sha256, not_before, not_after, \
             certificate_data, validation_status, stored_in_ldap, is_self_signed, \
             signature_algorithm, public_key_algorithm, public_key_size, conformance, \
             source_type, first_upload_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, {stored}, $12, $13, \
             $14, $15, $16, $17, $18, {now})",
            stored = dialect.bool_literal(false),
            now = dialect.current_timestamp(),
        );
        let insert = self.executor.execute(&sql, &[
            id.clone().into(),
            cert.cert_type.as_str().into(),
            cert.country_code.clone().into(),
            cert.subject_dn.clone().into(),
            cert.issuer_dn.clone().into(),
            cert.serial_number.clone().into(),
            cert.fingerprint_sha256.clone().into(),
            cert.not_before.into(),
            cert.not_after.into(),
            cert.der.clone().into(),
            cert.validation_status.as_str().into(),
            cert.is_self_signed.into(),
            cert.signature_algorithm.clone().into(),
            cert.public_key_algorithm.clone().into(),
            cert.public_key_bits.into(),
            cert.conformance.as_str().into(),
            cert.source_type.as_str().into(),
            cert.first_upload_id.clone().into(),
        ]);

        match insert {
            Ok(_) => {
                info!(
                    cert_type = cert.cert_type.as_str(),
                    country = %cert.country_code,
                    fingerprint = %cert.fingerprint_sha256,
                    "certificate stored"
                );
                Ok(PutOutcome::Inserted(id))
            }
            Err(StoreError::UniqueViolation) => {
                // Lost the insert race; the row exists now.
                let existing = self
                    .get_by_fingerprint(cert.cert_type, &cert.fingerprint_sha256)?
                    .ok_or_else(|| {
                        StoreError::Mapping("row vanished after unique violation".to_string())
                    })?;
                self.record_sighting(&existing.id, sighting)?;
                Ok(PutOutcome::Duplicate(existing.id))
            }
            Err(other) => Err(other),
        }
    }

    pub fn get_by_fingerprint(
        &self,
        cert_type: CertType,
        fingerprint: &str,
    ) -> Result<Option<CertificateRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM certificate \
             WHERE certificate_type = $1 AND fingerprint_sha256 = $2 {limit}",
            limit = self.executor.dialect().limit_clause(1),
        );
        let rows = self.executor.query(&sql, &[
            cert_type.as_str().into(),
            fingerprint.to_lowercase().into(),
        ])?;
        rows.first().map(map_certificate).transpose()
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<CertificateRecord>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM certificate WHERE id = $1");
        let rows = self.executor.query(&sql, &[id.into()])?;
        rows.first().map(map_certificate).transpose()
    }

    pub fn find_by_country(
        &self,
        cert_type: CertType,
        country: &str,
    ) -> Result<Vec<CertificateRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM certificate \
             WHERE certificate_type = $1 AND country_code = $2 ORDER BY not_before DESC"
        );
        let rows = self.executor.query(&sql, &[
            cert_type.as_str().into(),
            country.to_uppercase().into(),
        ])?;
        rows.iter().map(map_certificate).collect()
    }

    /// Certificates of `cert_type` whose subject matches `issuer_dn` under
    /// format-independent DN comparison.
    pub fn find_by_issuer(
        &self,
        cert_type: CertType,
        issuer_dn: &str,
        country: &str,
    ) -> Result<Vec<CertificateRecord>, StoreError> {
        let needle = normalize_dn(issuer_dn);
        let mut matches = self.find_by_country(cert_type, country)?;
        matches.retain(|record| normalize_dn(&record.subject_dn) == needle);
        Ok(matches)
    }

    pub fn mark_stored_in_ldap(&self, id: &str) -> Result<(), StoreError> {
        let dialect = self.executor.dialect();
        let sql = format!(
            "UPDATE certificate SET stored_in_ldap = {} WHERE id = $1",
            dialect.bool_literal(true)
        );
        self.executor.execute(&sql, &[id.into()])?;
        Ok(())
    }

    pub fn set_validation_status(
        &self,
        id: &str,
        status: ValidationStatus,
    ) -> Result<(), StoreError> {
        self.executor.execute(
            "UPDATE certificate SET validation_status = $1 WHERE id = $2",
            &[status.as_str().into(), id.into()],
        )?;
        Ok(())
    }

    /// Row counts per certificate type.
    pub fn counts_by_type(&self) -> Result<HashMap<CertType, i64>, StoreError> {
        let rows = self.executor.query(
            "SELECT certificate_type, COUNT(*) AS cnt FROM certificate \
             GROUP BY certificate_type",
            &[],
        )?;
        let mut counts = HashMap::new();
        for row in &rows {
            if let Some(cert_type) = CertType::parse(&row.text("certificate_type")?) {
                counts.insert(cert_type, row.int("cnt")?);
            }
        }
        Ok(counts)
    }

    /// Per-country counts for one type, for the sync-status breakdown.
    pub fn country_counts(&self, cert_type: CertType) -> Result<HashMap<String, i64>, StoreError> {
        let rows = self.executor.query(
            "SELECT country_code, COUNT(*) AS cnt FROM certificate \
             WHERE certificate_type = $1 GROUP BY country_code",
            &[cert_type.as_str().into()],
        )?;
        let mut counts = HashMap::new();
        for row in &rows {
            counts.insert(row.text("country_code")?, row.int("cnt")?);
        }
        Ok(counts)
    }

    /// Reconciliation candidates: rows not yet published to LDAP, oldest
    /// first, capped to the batch size.
    pub fn find_missing_in_ldap(
        &self,
        cert_type: CertType,
        limit: i64,
    ) -> Result<Vec<CertificateRecord>, StoreError> {
        let dialect = self.executor.dialect();
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM certificate \
             WHERE certificate_type = $1 AND stored_in_ldap = {stored} \
             ORDER BY created_at {limit}",
            stored = dialect.bool_literal(false),
            limit = dialect.limit_clause(limit),
        );
        let rows = self.executor.query(&sql, &[cert_type.as_str().into()])?;
        rows.iter().map(map_certificate).collect()
    }

    /// Page through every stored certificate (revalidation pass).
    pub fn page(&self, limit: i64, offset: i64) -> Result<Vec<CertificateRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM certificate ORDER BY created_at, id {page}",
            page = self.executor.dialect().pagination_clause(limit, offset),
        );
        let rows = self.executor.query(&sql, &[])?;
        rows.iter().map(map_certificate).collect()
    }

    // --- Duplicate ledger ---

    /// Append a sighting. Idempotent only by `(certificate_id, upload_id,
    /// source_file_name)`; all other repeats are retained.
    pub fn record_sighting(
        &self,
        certificate_id: &str,
        meta: &SightingMeta,
    ) -> Result<(), StoreError> {
        let dialect = self.executor.dialect();
        let sql = format!(
            "INSERT INTO certificate_duplicates (id, certificate_id, upload_id, \
             source_type, source_country, source_entry_dn, source_file_name, detected_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, {now})",
            now = dialect.current_timestamp(),
        );
        let result = self.executor.execute(&sql, &[
            dialect.generate_id().into(),
            certificate_id.into(),
            meta.upload_id.clone().into(),
            meta.source_type.clone().into(),
            meta.source_country.clone().into(),
            meta.source_entry_dn.clone().into(),
            meta.source_file_name.clone().into(),
        ]);
        match result {
            Ok(_) | Err(StoreError::UniqueViolation) => Ok(()),
            Err(other) => Err(other),
        }
    }

    /// Duplicate count for one certificate; non-decreasing over time.
    pub fn count_sightings(&self, certificate_id: &str) -> Result<i64, StoreError> {
        let rows = self.executor.query(
            "SELECT COUNT(*) AS cnt FROM certificate_duplicates WHERE certificate_id = $1",
            &[certificate_id.into()],
        )?;
        rows.first().map_or(Ok(0), |row| row.int("cnt"))
    }

    // --- Validation result materialization ---

    /// Record the chain validator's verdict for a certificate, replacing
    /// any previous verdict.
    pub fn write_validation_result(
        &self,
        outcome: &ValidationOutcomeRow,
    ) -> Result<(), StoreError> {
        self.executor.execute(
            "DELETE FROM validation_result WHERE certificate_id = $1",
            &[outcome.certificate_id.clone().into()],
        )?;
        let dialect = self.executor.dialect();
        let sql = format!(
            "INSERT INTO validation_result (id, certificate_id, trust_chain_valid, \
             csca_found, validity_period_valid, revocation_status, validated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, {now})",
            now = dialect.current_timestamp(),
        );
        self.executor.execute(&sql, &[
            dialect.generate_id().into(),
            outcome.certificate_id.clone().into(),
            outcome.trust_chain_valid.into(),
            outcome.csca_found.into(),
            outcome.validity_period_valid.into(),
            outcome.revocation_status.as_str().into(),
        ])?;
        Ok(())
    }
}

fn map_certificate(row: &Row) -> Result<CertificateRecord, StoreError> {
    let type_text = row.text("certificate_type")?;
    let cert_type = CertType::parse(&type_text)
        .ok_or_else(|| StoreError::Mapping(format!("unknown certificate type {type_text:?}")))?;
    Ok(CertificateRecord {
        id: row.text("id")?,
        cert_type,
        country_code: row.text("country_code")?,
        subject_dn: row.text("subject_dn")?,
        issuer_dn: row.text("issuer_dn")?,
        serial_number: row.text("serial_number")?,
        fingerprint_sha256: row.text("fingerprint_sha256")?,
        not_before: row.datetime("not_before")?,
        not_after: row.datetime("not_after")?,
        der: row.blob("certificate_data")?,
        signature_algorithm: row.opt_text("signature_algorithm"),
        public_key_algorithm: row.opt_text("public_key_algorithm"),
        public_key_bits: row.int("public_key_size").unwrap_or(0),
        is_self_signed: row.bool("is_self_signed")?,
        stored_in_ldap: row.bool("stored_in_ldap")?,
        conformance: row
            .opt_text("conformance")
            .and_then(|v| Conformance::parse(&v))
            .unwrap_or_default(),
        source_type: row
            .opt_text("source_type")
            .and_then(|v| SourceType::parse(&v))
            .unwrap_or(SourceType::Upload),
        first_upload_id: row.opt_text("first_upload_id"),
        validation_status: row
            .opt_text("validation_status")
            .and_then(|v| ValidationStatus::parse(&v))
            .unwrap_or_default(),
    })
}
