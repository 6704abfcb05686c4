//! ICAO PKD collection version ledger and revalidation history.
//!
//! The portal scraper and downloader are external; this repository only
//! enforces the version lifecycle they drive: DETECTED → NOTIFIED →
//! DOWNLOADED → IMPORTED, with FAILED as a terminal state, never moving
//! backwards. `(collection_type, version)` is unique.

use {
    super::{executor::Row, QueryExecutor, StoreError},
    chrono::{DateTime, Utc},
    std::sync::Arc,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum IcaoVersionStatus {
    Detected,
    Notified,
    Downloaded,
    Imported,
    Failed,
}

impl IcaoVersionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detected => "DETECTED",
            Self::Notified => "NOTIFIED",
            Self::Downloaded => "DOWNLOADED",
            Self::Imported => "IMPORTED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "DETECTED" => Self::Detected,
            "NOTIFIED" => Self::Notified,
            "DOWNLOADED" => Self::Downloaded,
            "IMPORTED" => Self::Imported,
            "FAILED" => Self::Failed,
            _ => return None,
        })
    }

    /// Whether a transition to `next` moves the lifecycle forward.
    /// `FAILED` is reachable from anywhere but terminal.
    pub fn can_advance_to(self, next: Self) -> bool {
        if self == Self::Failed {
            return false;
        }
        next == Self::Failed || next > self
    }
}

#[derive(Clone, Debug)]
pub struct IcaoVersion {
    pub id:              String,
    pub collection_type: String,
    pub file_name:       Option<String>,
    pub version:         i64,
    pub status:          IcaoVersionStatus,
    pub detected_at:     Option<DateTime<Utc>>,
    pub downloaded_at:   Option<DateTime<Utc>>,
    pub imported_at:     Option<DateTime<Utc>>,
    pub error_message:   Option<String>,
}

#[derive(Clone)]
pub struct IcaoVersionStore {
    executor: Arc<dyn QueryExecutor>,
}

impl IcaoVersionStore {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Record a newly detected collection version. Re-detecting a known
    /// version is a no-op returning the existing row.
    pub fn detect(
        &self,
        collection_type: &str,
        version: i64,
        file_name: Option<&str>,
    ) -> Result<IcaoVersion, StoreError> {
        if let Some(existing) = self.find(collection_type, version)? {
            return Ok(existing);
        }
        let dialect = self.executor.dialect();
        let id = dialect.generate_id();
        let sql = format!(
            "INSERT INTO icao_pkd_versions (id, collection_type, file_name, version, status, \
             detected_at) VALUES ($1, $2, $3, $4, 'DETECTED', {now})",
            now = dialect.current_timestamp(),
        );
        let result = self.executor.execute(&sql, &[
            id.into(),
            collection_type.into(),
            file_name.map(str::to_string).into(),
            version.into(),
        ]);
        match result {
            // A concurrent detect of the same version wins the race; read
            // back whichever row landed.
            Ok(_) | Err(StoreError::UniqueViolation) => self
                .find(collection_type, version)?
                .ok_or_else(|| StoreError::Mapping("detected version vanished".to_string())),
            Err(other) => Err(other),
        }
    }

    /// Advance the lifecycle. Backwards transitions are rejected as a
    /// mapping error; FAILED records the error text.
    pub fn advance(
        &self,
        collection_type: &str,
        version: i64,
        next: IcaoVersionStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let current = self
            .find(collection_type, version)?
            .ok_or_else(|| StoreError::Mapping("unknown collection version".to_string()))?;
        if !current.status.can_advance_to(next) {
            return Err(StoreError::Mapping(format!(
                "illegal status transition {} -> {}",
                current.status.as_str(),
                next.as_str()
            )));
        }
        let dialect = self.executor.dialect();
        let timestamp_column = match next {
            IcaoVersionStatus::Downloaded => ", downloaded_at = ".to_string() + dialect.current_timestamp(),
            IcaoVersionStatus::Imported => ", imported_at = ".to_string() + dialect.current_timestamp(),
            _ => String::new(),
        };
        let sql = format!(
            "UPDATE icao_pkd_versions SET status = $1, error_message = $2{timestamp_column} \
             WHERE collection_type = $3 AND version = $4"
        );
        self.executor.execute(&sql, &[
            next.as_str().into(),
            error_message.map(str::to_string).into(),
            collection_type.into(),
            version.into(),
        ])?;
        Ok(())
    }

    pub fn find(
        &self,
        collection_type: &str,
        version: i64,
    ) -> Result<Option<IcaoVersion>, StoreError> {
        let rows = self.executor.query(
            "SELECT id, collection_type, file_name, version, status, detected_at, \
             downloaded_at, imported_at, error_message FROM icao_pkd_versions \
             WHERE collection_type = $1 AND version = $2",
            &[collection_type.into(), version.into()],
        )?;
        rows.first().map(map_version).transpose()
    }

    pub fn latest(&self, collection_type: &str) -> Result<Option<IcaoVersion>, StoreError> {
        let sql = format!(
            "SELECT id, collection_type, file_name, version, status, detected_at, \
             downloaded_at, imported_at, error_message FROM icao_pkd_versions \
             WHERE collection_type = $1 ORDER BY version DESC {limit}",
            limit = self.executor.dialect().limit_clause(1),
        );
        let rows = self.executor.query(&sql, &[collection_type.into()])?;
        rows.first().map(map_version).transpose()
    }
}

fn map_version(row: &Row) -> Result<IcaoVersion, StoreError> {
    let status_text = row.text("status")?;
    Ok(IcaoVersion {
        id: row.text("id")?,
        collection_type: row.text("collection_type")?,
        file_name: row.opt_text("file_name"),
        version: row.int("version")?,
        status: IcaoVersionStatus::parse(&status_text)
            .ok_or_else(|| StoreError::Mapping(format!("unknown status {status_text:?}")))?,
        detected_at: row.opt_datetime("detected_at"),
        downloaded_at: row.opt_datetime("downloaded_at"),
        imported_at: row.opt_datetime("imported_at"),
        error_message: row.opt_text("error_message"),
    })
}

/// Summary row for one certificate revalidation pass.
#[derive(Clone, Debug, Default)]
pub struct RevalidationRun {
    pub triggered_by:  String,
    pub total_count:   i64,
    pub valid_count:   i64,
    pub expired_count: i64,
    pub failed_count:  i64,
    pub duration_ms:   i64,
}

impl IcaoVersionStore {
    /// Record a completed revalidation pass.
    pub fn record_revalidation(&self, run: &RevalidationRun) -> Result<(), StoreError> {
        let dialect = self.executor.dialect();
        let sql = format!(
            "INSERT INTO revalidation_history (id, triggered_by, total_count, valid_count, \
             expired_count, failed_count, duration_ms, started_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, {now})",
            now = dialect.current_timestamp(),
        );
        self.executor.execute(&sql, &[
            dialect.generate_id().into(),
            run.triggered_by.clone().into(),
            run.total_count.into(),
            run.valid_count.into(),
            run.expired_count.into(),
            run.failed_count.into(),
            run.duration_ms.into(),
        ])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_progression_is_monotonic() {
        use IcaoVersionStatus::*;
        assert!(Detected.can_advance_to(Notified));
        assert!(Detected.can_advance_to(Downloaded));
        assert!(Downloaded.can_advance_to(Imported));
        assert!(Downloaded.can_advance_to(Failed));
        assert!(!Imported.can_advance_to(Detected));
        assert!(!Failed.can_advance_to(Detected));
        assert!(!Failed.can_advance_to(Imported));
    }
}
