//! Schema bootstrap.
//!
//! Rendered in the portable subset both server dialects and the embedded
//! executor accept. Timestamps are TEXT (RFC 3339 or the backend's
//! `CURRENT_TIMESTAMP` form), JSON breakdowns are TEXT, binaries are
//! BLOBs.

use super::{QueryExecutor, StoreError};

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS certificate (
        id TEXT PRIMARY KEY,
        certificate_type TEXT NOT NULL,
        country_code TEXT NOT NULL,
        subject_dn TEXT NOT NULL,
        issuer_dn TEXT NOT NULL,
        serial_number TEXT NOT NULL,
        fingerprint_sha256 TEXT NOT NULL,
        not_before TEXT NOT NULL,
        not_after TEXT NOT NULL,
        certificate_data BLOB NOT NULL,
        validation_status TEXT NOT NULL DEFAULT 'UNKNOWN',
        stored_in_ldap BOOLEAN NOT NULL DEFAULT FALSE,
        is_self_signed BOOLEAN NOT NULL DEFAULT FALSE,
        signature_algorithm TEXT,
        public_key_algorithm TEXT,
        public_key_size INTEGER,
        conformance TEXT NOT NULL DEFAULT 'CONFORMANT',
        source_type TEXT NOT NULL DEFAULT 'UPLOAD',
        first_upload_id TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (certificate_type, fingerprint_sha256)
    )",
    "CREATE TABLE IF NOT EXISTS crl (
        id TEXT PRIMARY KEY,
        country_code TEXT NOT NULL,
        issuer_dn TEXT NOT NULL,
        fingerprint_sha256 TEXT NOT NULL,
        this_update TEXT,
        next_update TEXT,
        crl_binary BLOB NOT NULL,
        stored_in_ldap BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TEXT NOT NULL,
        UNIQUE (country_code, fingerprint_sha256)
    )",
    "CREATE TABLE IF NOT EXISTS certificate_duplicates (
        id TEXT PRIMARY KEY,
        certificate_id TEXT NOT NULL,
        upload_id TEXT,
        source_type TEXT,
        source_country TEXT,
        source_entry_dn TEXT,
        source_file_name TEXT,
        detected_at TEXT NOT NULL,
        UNIQUE (certificate_id, upload_id, source_file_name)
    )",
    "CREATE TABLE IF NOT EXISTS pa_verification (
        id TEXT PRIMARY KEY,
        issuing_country TEXT,
        document_number TEXT,
        sod_binary BLOB,
        sod_hash TEXT,
        verification_status TEXT NOT NULL,
        dsc_subject TEXT,
        dsc_serial_number TEXT,
        dsc_issuer TEXT,
        dsc_expired BOOLEAN NOT NULL DEFAULT FALSE,
        csca_subject TEXT,
        csca_serial_number TEXT,
        csca_expired BOOLEAN NOT NULL DEFAULT FALSE,
        trust_chain_valid BOOLEAN NOT NULL DEFAULT FALSE,
        sod_signature_valid BOOLEAN NOT NULL DEFAULT FALSE,
        dg_hashes_valid BOOLEAN NOT NULL DEFAULT FALSE,
        crl_checked BOOLEAN NOT NULL DEFAULT FALSE,
        revoked BOOLEAN NOT NULL DEFAULT FALSE,
        crl_status TEXT,
        expiration_status TEXT,
        validation_errors TEXT,
        ip_address TEXT,
        user_agent TEXT,
        processing_time_ms INTEGER,
        request_timestamp TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS pa_data_group (
        id TEXT PRIMARY KEY,
        verification_id TEXT NOT NULL,
        dg_number INTEGER NOT NULL,
        expected_hash TEXT,
        actual_hash TEXT,
        hash_algorithm TEXT,
        hash_valid BOOLEAN NOT NULL DEFAULT FALSE,
        dg_binary BLOB
    )",
    "CREATE TABLE IF NOT EXISTS sync_status (
        id TEXT PRIMARY KEY,
        checked_at TEXT NOT NULL,
        db_csca_count INTEGER NOT NULL DEFAULT 0,
        db_mlsc_count INTEGER NOT NULL DEFAULT 0,
        db_dsc_count INTEGER NOT NULL DEFAULT 0,
        db_dsc_nc_count INTEGER NOT NULL DEFAULT 0,
        db_crl_count INTEGER NOT NULL DEFAULT 0,
        ldap_csca_count INTEGER NOT NULL DEFAULT 0,
        ldap_mlsc_count INTEGER NOT NULL DEFAULT 0,
        ldap_dsc_count INTEGER NOT NULL DEFAULT 0,
        ldap_dsc_nc_count INTEGER NOT NULL DEFAULT 0,
        ldap_crl_count INTEGER NOT NULL DEFAULT 0,
        ldap_total_entries INTEGER NOT NULL DEFAULT 0,
        csca_discrepancy INTEGER NOT NULL DEFAULT 0,
        mlsc_discrepancy INTEGER NOT NULL DEFAULT 0,
        dsc_discrepancy INTEGER NOT NULL DEFAULT 0,
        dsc_nc_discrepancy INTEGER NOT NULL DEFAULT 0,
        crl_discrepancy INTEGER NOT NULL DEFAULT 0,
        total_discrepancy INTEGER NOT NULL DEFAULT 0,
        db_country_stats TEXT,
        ldap_country_stats TEXT,
        status TEXT NOT NULL,
        error_message TEXT,
        check_duration_ms INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS reconciliation_summary (
        id TEXT PRIMARY KEY,
        sync_status_id TEXT,
        triggered_by TEXT,
        dry_run BOOLEAN NOT NULL DEFAULT FALSE,
        started_at TEXT NOT NULL,
        finished_at TEXT,
        csca_added INTEGER NOT NULL DEFAULT 0,
        mlsc_added INTEGER NOT NULL DEFAULT 0,
        dsc_added INTEGER NOT NULL DEFAULT 0,
        crl_added INTEGER NOT NULL DEFAULT 0,
        success_count INTEGER NOT NULL DEFAULT 0,
        failed_count INTEGER NOT NULL DEFAULT 0,
        duration_ms INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        error_message TEXT
    )",
    "CREATE TABLE IF NOT EXISTS reconciliation_log (
        id TEXT PRIMARY KEY,
        summary_id TEXT NOT NULL,
        operation TEXT NOT NULL,
        certificate_type TEXT,
        fingerprint_sha256 TEXT,
        country_code TEXT,
        ldap_dn TEXT,
        result TEXT NOT NULL,
        error_message TEXT,
        duration_ms INTEGER NOT NULL DEFAULT 0,
        logged_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS validation_result (
        id TEXT PRIMARY KEY,
        certificate_id TEXT NOT NULL,
        trust_chain_valid BOOLEAN NOT NULL DEFAULT FALSE,
        csca_found BOOLEAN NOT NULL DEFAULT FALSE,
        validity_period_valid BOOLEAN NOT NULL DEFAULT FALSE,
        revocation_status TEXT NOT NULL DEFAULT 'UNKNOWN',
        validated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS revalidation_history (
        id TEXT PRIMARY KEY,
        triggered_by TEXT,
        total_count INTEGER NOT NULL DEFAULT 0,
        valid_count INTEGER NOT NULL DEFAULT 0,
        expired_count INTEGER NOT NULL DEFAULT 0,
        failed_count INTEGER NOT NULL DEFAULT 0,
        duration_ms INTEGER NOT NULL DEFAULT 0,
        started_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS operation_audit_log (
        id TEXT PRIMARY KEY,
        operation TEXT NOT NULL,
        subject TEXT,
        ip_address TEXT,
        success BOOLEAN NOT NULL DEFAULT TRUE,
        error_message TEXT,
        duration_ms INTEGER NOT NULL DEFAULT 0,
        metadata TEXT,
        logged_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS icao_pkd_versions (
        id TEXT PRIMARY KEY,
        collection_type TEXT NOT NULL,
        file_name TEXT,
        version INTEGER NOT NULL,
        status TEXT NOT NULL,
        detected_at TEXT,
        downloaded_at TEXT,
        imported_at TEXT,
        error_message TEXT,
        UNIQUE (collection_type, version)
    )",
    "CREATE TABLE IF NOT EXISTS sync_config (
        id TEXT PRIMARY KEY,
        daily_sync_enabled BOOLEAN NOT NULL DEFAULT TRUE,
        daily_sync_hour INTEGER NOT NULL DEFAULT 2,
        daily_sync_minute INTEGER NOT NULL DEFAULT 0,
        revalidate_certs_on_sync BOOLEAN NOT NULL DEFAULT FALSE,
        auto_reconcile BOOLEAN NOT NULL DEFAULT FALSE,
        max_reconcile_batch_size INTEGER NOT NULL DEFAULT 500,
        updated_at TEXT
    )",
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_certificate_country
        ON certificate (certificate_type, country_code)",
    "CREATE INDEX IF NOT EXISTS idx_certificate_ldap
        ON certificate (certificate_type, stored_in_ldap)",
    "CREATE INDEX IF NOT EXISTS idx_pa_verification_time
        ON pa_verification (request_timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_pa_data_group_verification
        ON pa_data_group (verification_id)",
    "CREATE INDEX IF NOT EXISTS idx_recon_log_summary
        ON reconciliation_log (summary_id)",
];

/// Create every table and index this crate expects.
pub fn create_schema(executor: &dyn QueryExecutor) -> Result<(), StoreError> {
    for ddl in TABLES.iter().chain(INDEXES) {
        executor.execute(ddl, &[])?;
    }
    Ok(())
}
