//! CRL repository, content-addressed per country.

use {
    super::{executor::Row, QueryExecutor, SqlValue, StoreError},
    crate::x509::CrlInfo,
    chrono::{DateTime, Utc},
    std::sync::Arc,
    tracing::info,
};

#[derive(Clone, Debug)]
pub struct CrlRecord {
    pub id:                 String,
    pub country_code:       String,
    pub issuer_dn:          String,
    pub fingerprint_sha256: String,
    pub this_update:        Option<DateTime<Utc>>,
    pub next_update:        Option<DateTime<Utc>>,
    pub der:                Vec<u8>,
    pub stored_in_ldap:     bool,
}

#[derive(Clone, Debug)]
pub struct NewCrl {
    pub country_code:       String,
    pub issuer_dn:          String,
    pub fingerprint_sha256: String,
    pub this_update:        Option<DateTime<Utc>>,
    pub next_update:        Option<DateTime<Utc>>,
    pub der:                Vec<u8>,
}

impl NewCrl {
    pub fn from_parsed(info: &CrlInfo, country_override: Option<&str>) -> Self {
        let country_code = country_override
            .map(crate::country::normalize_to_alpha2)
            .or_else(|| {
                info.issuer
                    .country
                    .as_deref()
                    .map(crate::country::normalize_to_alpha2)
            })
            .unwrap_or_else(|| "XX".to_string());
        Self {
            country_code,
            issuer_dn: info.issuer_dn.clone(),
            fingerprint_sha256: info.fingerprint_sha256.clone(),
            this_update: Some(info.this_update),
            next_update: info.next_update,
            der: info.der.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CrlStore {
    executor: Arc<dyn QueryExecutor>,
}

const SELECT_COLUMNS: &str = "id, country_code, issuer_dn, fingerprint_sha256, this_update, \
                              next_update, crl_binary, stored_in_ldap";

impl CrlStore {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Insert unless the `(country, fingerprint)` pair already exists;
    /// returns the row id either way.
    pub fn put(&self, crl: &NewCrl) -> Result<String, StoreError> {
        if let Some(existing) =
            self.get_by_fingerprint(&crl.country_code, &crl.fingerprint_sha256)?
        {
            return Ok(existing.id);
        }
        let dialect = self.executor.dialect();
        let id = dialect.generate_id();
        let sql = format!(
            "INSERT INTO crl (id, country_code, issuer_dn, fingerprint_sha256, this_update, \
             next_update, crl_binary, stored_in_ldap, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, {stored}, {now})",
            stored = dialect.bool_literal(false),
            now = dialect.current_timestamp(),
        );
        let result = self.executor.execute(&sql, &[
            id.clone().into(),
            crl.country_code.clone().into(),
            crl.issuer_dn.clone().into(),
            crl.fingerprint_sha256.clone().into(),
            optional_datetime(crl.this_update),
            optional_datetime(crl.next_update),
            crl.der.clone().into(),
        ]);
        match result {
            Ok(_) => {
                info!(country = %crl.country_code, "CRL stored");
                Ok(id)
            }
            Err(StoreError::UniqueViolation) => {
                let existing = self
                    .get_by_fingerprint(&crl.country_code, &crl.fingerprint_sha256)?
                    .ok_or_else(|| {
                        StoreError::Mapping("row vanished after unique violation".to_string())
                    })?;
                Ok(existing.id)
            }
            Err(other) => Err(other),
        }
    }

    pub fn get_by_fingerprint(
        &self,
        country: &str,
        fingerprint: &str,
    ) -> Result<Option<CrlRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM crl \
             WHERE country_code = $1 AND fingerprint_sha256 = $2 {limit}",
            limit = self.executor.dialect().limit_clause(1),
        );
        let rows = self.executor.query(&sql, &[
            country.to_uppercase().into(),
            fingerprint.to_lowercase().into(),
        ])?;
        rows.first().map(map_crl).transpose()
    }

    /// Freshest CRL for a country by `this_update`.
    pub fn find_latest_by_country(&self, country: &str) -> Result<Option<CrlRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM crl WHERE country_code = $1 \
             ORDER BY this_update DESC {limit}",
            limit = self.executor.dialect().limit_clause(1),
        );
        let rows = self
            .executor
            .query(&sql, &[country.to_uppercase().into()])?;
        rows.first().map(map_crl).transpose()
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let rows = self
            .executor
            .query("SELECT COUNT(*) AS cnt FROM crl", &[])?;
        rows.first().map_or(Ok(0), |row| row.int("cnt"))
    }

    pub fn country_counts(&self) -> Result<std::collections::HashMap<String, i64>, StoreError> {
        let rows = self.executor.query(
            "SELECT country_code, COUNT(*) AS cnt FROM crl GROUP BY country_code",
            &[],
        )?;
        let mut counts = std::collections::HashMap::new();
        for row in &rows {
            counts.insert(row.text("country_code")?, row.int("cnt")?);
        }
        Ok(counts)
    }

    pub fn find_missing_in_ldap(&self, limit: i64) -> Result<Vec<CrlRecord>, StoreError> {
        let dialect = self.executor.dialect();
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM crl WHERE stored_in_ldap = {stored} \
             ORDER BY created_at {limit}",
            stored = dialect.bool_literal(false),
            limit = dialect.limit_clause(limit),
        );
        let rows = self.executor.query(&sql, &[])?;
        rows.iter().map(map_crl).collect()
    }

    pub fn mark_stored_in_ldap(&self, id: &str) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE crl SET stored_in_ldap = {} WHERE id = $1",
            self.executor.dialect().bool_literal(true)
        );
        self.executor.execute(&sql, &[id.into()])?;
        Ok(())
    }
}

fn optional_datetime(value: Option<DateTime<Utc>>) -> SqlValue {
    value.map_or(SqlValue::Null, Into::into)
}

fn map_crl(row: &Row) -> Result<CrlRecord, StoreError> {
    Ok(CrlRecord {
        id: row.text("id")?,
        country_code: row.text("country_code")?,
        issuer_dn: row.text("issuer_dn")?,
        fingerprint_sha256: row.text("fingerprint_sha256")?,
        this_update: row.opt_datetime("this_update"),
        next_update: row.opt_datetime("next_update"),
        der: row.blob("crl_binary")?,
        stored_in_ldap: row.bool("stored_in_ldap")?,
    })
}
