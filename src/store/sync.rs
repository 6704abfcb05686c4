//! Sync status history and runtime sync configuration.

use {
    super::{executor::Row, QueryExecutor, StoreError},
    chrono::{DateTime, Utc},
    serde::Serialize,
    std::sync::Arc,
};

/// Entry counts per certificate kind, on either side of the comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub csca:   i64,
    pub mlsc:   i64,
    pub dsc:    i64,
    pub dsc_nc: i64,
    pub crl:    i64,
}

impl TypeCounts {
    pub fn total(&self) -> i64 {
        self.csca + self.mlsc + self.dsc + self.dsc_nc + self.crl
    }
}

/// One DB-vs-LDAP comparison outcome.
#[derive(Clone, Debug, Serialize)]
pub struct SyncStatusRecord {
    pub id:                 String,
    #[serde(skip)]
    pub checked_at:         Option<DateTime<Utc>>,
    pub db:                 TypeCounts,
    pub ldap:               TypeCounts,
    pub ldap_total_entries: i64,
    pub status:             String,
    pub error_message:      Option<String>,
    pub db_country_stats:   Option<serde_json::Value>,
    pub ldap_country_stats: Option<serde_json::Value>,
    pub check_duration_ms:  i64,
}

impl SyncStatusRecord {
    pub fn discrepancy(&self, db: i64, ldap: i64) -> i64 {
        db - ldap
    }

    /// `Σ |dbCount_t − ldapCount_t|` over every tracked type.
    pub fn total_discrepancy(&self) -> i64 {
        (self.db.csca - self.ldap.csca).abs()
            + (self.db.mlsc - self.ldap.mlsc).abs()
            + (self.db.dsc - self.ldap.dsc).abs()
            + (self.db.dsc_nc - self.ldap.dsc_nc).abs()
            + (self.db.crl - self.ldap.crl).abs()
    }
}

#[derive(Clone)]
pub struct SyncStatusStore {
    executor: Arc<dyn QueryExecutor>,
}

const SELECT_COLUMNS: &str =
    "id, checked_at, db_csca_count, db_mlsc_count, db_dsc_count, db_dsc_nc_count, \
     db_crl_count, ldap_csca_count, ldap_mlsc_count, ldap_dsc_count, ldap_dsc_nc_count, \
     ldap_crl_count, ldap_total_entries, total_discrepancy, db_country_stats, \
     ldap_country_stats, status, error_message, check_duration_ms";

impl SyncStatusStore {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    pub fn insert(&self, record: &SyncStatusRecord) -> Result<String, StoreError> {
        let dialect = self.executor.dialect();
        let id = dialect.generate_id();
        let sql = format!(
            "INSERT INTO sync_status (id, checked_at, db_csca_count, db_mlsc_count, \
             db_dsc_count, db_dsc_nc_count, db_crl_count, ldap_csca_count, ldap_mlsc_count, \
             ldap_dsc_count, ldap_dsc_nc_count, ldap_crl_count, ldap_total_entries, \
             csca_discrepancy, mlsc_discrepancy, dsc_discrepancy, dsc_nc_discrepancy, \
             crl_discrepancy, total_discrepancy, db_country_stats, ldap_country_stats, \
             status, error_message, check_duration_ms) \
             VALUES ($1, {now}, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
             $15, $16, $17, $18, $19, $20, $21, $22, $23)",
            now = dialect.current_timestamp(),
        );
        let json_or_empty = |value: &Option<serde_json::Value>| {
            value
                .as_ref()
                .map_or_else(|| "{}".to_string(), ToString::to_string)
        };
        self.executor.execute(&sql, &[
            id.clone().into(),
            record.db.csca.into(),
            record.db.mlsc.into(),
            record.db.dsc.into(),
            record.db.dsc_nc.into(),
            record.db.crl.into(),
            record.ldap.csca.into(),
            record.ldap.mlsc.into(),
            record.ldap.dsc.into(),
            record.ldap.dsc_nc.into(),
            record.ldap.crl.into(),
            record.ldap_total_entries.into(),
            (record.db.csca - record.ldap.csca).into(),
            (record.db.mlsc - record.ldap.mlsc).into(),
            (record.db.dsc - record.ldap.dsc).into(),
            (record.db.dsc_nc - record.ldap.dsc_nc).into(),
            (record.db.crl - record.ldap.crl).into(),
            record.total_discrepancy().into(),
            json_or_empty(&record.db_country_stats).into(),
            json_or_empty(&record.ldap_country_stats).into(),
            record.status.clone().into(),
            record.error_message.clone().into(),
            record.check_duration_ms.into(),
        ])?;
        Ok(id)
    }

    pub fn find_latest(&self) -> Result<Option<SyncStatusRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM sync_status ORDER BY checked_at DESC {limit}",
            limit = self.executor.dialect().limit_clause(1),
        );
        let rows = self.executor.query(&sql, &[])?;
        rows.first().map(map_sync_status).transpose()
    }

    pub fn find_all(&self, limit: i64, offset: i64) -> Result<Vec<SyncStatusRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM sync_status ORDER BY checked_at DESC {page}",
            page = self.executor.dialect().pagination_clause(limit, offset),
        );
        let rows = self.executor.query(&sql, &[])?;
        rows.iter().map(map_sync_status).collect()
    }
}

fn map_sync_status(row: &Row) -> Result<SyncStatusRecord, StoreError> {
    let parse_json = |column: &str| {
        row.opt_text(column)
            .and_then(|text| serde_json::from_str(&text).ok())
    };
    Ok(SyncStatusRecord {
        id: row.text("id")?,
        checked_at: row.opt_datetime("checked_at"),
        db: TypeCounts {
            csca:   row.int("db_csca_count")?,
            mlsc:   row.int("db_mlsc_count")?,
            dsc:    row.int("db_dsc_count")?,
            dsc_nc: row.int("db_dsc_nc_count")?,
            crl:    row.int("db_crl_count")?,
        },
        ldap: TypeCounts {
            csca:   row.int("ldap_csca_count")?,
            mlsc:   row.int("ldap_mlsc_count")?,
            dsc:    row.int("ldap_dsc_count")?,
            dsc_nc: row.int("ldap_dsc_nc_count")?,
            crl:    row.int("ldap_crl_count")?,
        },
        ldap_total_entries: row.int("ldap_total_entries")?,
        status: row.text("status")?,
        error_message: row.opt_text("error_message"),
        db_country_stats: parse_json("db_country_stats"),
        ldap_country_stats: parse_json("ldap_country_stats"),
        check_duration_ms: row.int("check_duration_ms")?,
    })
}

/// Scheduler settings persisted in the `sync_config` table so they survive
/// restarts and can be reloaded at runtime.
#[derive(Clone, Debug, Serialize)]
pub struct SyncConfig {
    pub daily_sync_enabled:       bool,
    pub daily_sync_hour:          u32,
    pub daily_sync_minute:        u32,
    pub revalidate_certs_on_sync: bool,
    pub auto_reconcile:           bool,
    pub max_reconcile_batch_size: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            daily_sync_enabled:       true,
            daily_sync_hour:          2,
            daily_sync_minute:        0,
            revalidate_certs_on_sync: false,
            auto_reconcile:           false,
            max_reconcile_batch_size: 500,
        }
    }
}

#[derive(Clone)]
pub struct SyncConfigStore {
    executor: Arc<dyn QueryExecutor>,
}

impl SyncConfigStore {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Load the persisted configuration, falling back to defaults when the
    /// table is empty.
    pub fn load(&self) -> Result<SyncConfig, StoreError> {
        let sql = format!(
            "SELECT daily_sync_enabled, daily_sync_hour, daily_sync_minute, \
             revalidate_certs_on_sync, auto_reconcile, max_reconcile_batch_size \
             FROM sync_config ORDER BY id {limit}",
            limit = self.executor.dialect().limit_clause(1),
        );
        let rows = self.executor.query(&sql, &[])?;
        let Some(row) = rows.first() else {
            return Ok(SyncConfig::default());
        };
        Ok(SyncConfig {
            daily_sync_enabled:       row.bool("daily_sync_enabled")?,
            daily_sync_hour:          row.int("daily_sync_hour")? as u32 % 24,
            daily_sync_minute:        row.int("daily_sync_minute")? as u32 % 60,
            revalidate_certs_on_sync: row.bool("revalidate_certs_on_sync")?,
            auto_reconcile:           row.bool("auto_reconcile")?,
            max_reconcile_batch_size: row.int("max_reconcile_batch_size")?,
        })
    }

    /// Replace the persisted configuration.
    pub fn save(&self, config: &SyncConfig) -> Result<(), StoreError> {
        let dialect = self.executor.dialect();
        self.executor.execute("DELETE FROM sync_config", &[])?;
        let sql = format!(
            "INSERT INTO sync_config (id, daily_sync_enabled, daily_sync_hour, \
             daily_sync_minute, revalidate_certs_on_sync, auto_reconcile, \
             max_reconcile_batch_size, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, {now})",
            now = dialect.current_timestamp(),
        );
        self.executor.execute(&sql, &[
            dialect.generate_id().into(),
            config.daily_sync_enabled.into(),
            i64::from(config.daily_sync_hour).into(),
            i64::from(config.daily_sync_minute).into(),
            config.revalidate_certs_on_sync.into(),
            config.auto_reconcile.into(),
            config.max_reconcile_batch_size.into(),
        ])?;
        Ok(())
    }
}
