//! The query-executor seam between repositories and SQL backends.
//!
//! Repositories render dialect-appropriate SQL with `$1..$n` placeholders
//! and bind [`SqlValue`]s; an executor runs the statement against its
//! backend and returns [`Row`]s with lowercase column names (Oracle
//! uppercases them otherwise).

use {
    super::{Dialect, StoreError},
    chrono::{DateTime, NaiveDateTime, Utc},
    std::collections::HashMap,
};

/// A bound parameter or a result cell.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Bool(bool),
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<Option<String>> for SqlValue {
    fn from(v: Option<String>) -> Self {
        v.map_or(Self::Null, Self::Text)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Text(v.to_rfc3339())
    }
}

/// One result row, keyed by lowercase column name.
#[derive(Clone, Debug, Default)]
pub struct Row(pub HashMap<String, SqlValue>);

impl Row {
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.0.get(column)
    }

    pub fn text(&self, column: &str) -> Result<String, StoreError> {
        match self.get(column) {
            Some(SqlValue::Text(v)) => Ok(v.clone()),
            Some(SqlValue::Int(v)) => Ok(v.to_string()),
            other => Err(mapping_error(column, other)),
        }
    }

    pub fn opt_text(&self, column: &str) -> Option<String> {
        match self.get(column) {
            Some(SqlValue::Text(v)) if !v.is_empty() => Some(v.clone()),
            _ => None,
        }
    }

    pub fn int(&self, column: &str) -> Result<i64, StoreError> {
        match self.get(column) {
            Some(SqlValue::Int(v)) => Ok(*v),
            Some(SqlValue::Real(v)) => Ok(*v as i64),
            Some(SqlValue::Text(v)) => v
                .parse()
                .map_err(|_| mapping_error(column, self.get(column))),
            other => Err(mapping_error(column, other)),
        }
    }

    pub fn bool(&self, column: &str) -> Result<bool, StoreError> {
        match self.get(column) {
            Some(SqlValue::Bool(v)) => Ok(*v),
            Some(SqlValue::Int(v)) => Ok(*v != 0),
            Some(SqlValue::Text(v)) => {
                Ok(matches!(v.as_str(), "t" | "true" | "TRUE" | "1" | "Y"))
            }
            other => Err(mapping_error(column, other)),
        }
    }

    pub fn blob(&self, column: &str) -> Result<Vec<u8>, StoreError> {
        match self.get(column) {
            Some(SqlValue::Blob(v)) => Ok(v.clone()),
            other => Err(mapping_error(column, other)),
        }
    }

    pub fn datetime(&self, column: &str) -> Result<DateTime<Utc>, StoreError> {
        let text = self.text(column)?;
        parse_datetime(&text).ok_or_else(|| {
            StoreError::Mapping(format!("column {column}: unparseable timestamp {text:?}"))
        })
    }

    pub fn opt_datetime(&self, column: &str) -> Option<DateTime<Utc>> {
        self.opt_text(column).as_deref().and_then(parse_datetime)
    }
}

/// Timestamps come back either as RFC 3339 (bound by us) or in the
/// backend's `CURRENT_TIMESTAMP` text form.
fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn mapping_error(column: &str, value: Option<&SqlValue>) -> StoreError {
    StoreError::Mapping(format!("column {column}: unexpected value {value:?}"))
}

/// Backend abstraction: executes parameterized SQL rendered for
/// [`QueryExecutor::dialect`].
pub trait QueryExecutor: Send + Sync {
    /// The dialect tag this backend registered with; repositories render
    /// SQL for it.
    fn dialect(&self) -> Dialect;

    /// Run a SELECT, returning all rows.
    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StoreError>;

    /// Run a statement, returning the affected row count.
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_parsing_accepts_both_forms() {
        assert!(parse_datetime("2026-03-01T09:30:00+00:00").is_some());
        assert!(parse_datetime("2026-03-01 09:30:00").is_some());
        assert!(parse_datetime("2026-03-01 09:30:00.123456").is_some());
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn row_bool_accepts_backend_spellings() {
        let mut row = Row::default();
        row.0.insert("a".into(), SqlValue::Int(1));
        row.0.insert("b".into(), SqlValue::Text("t".into()));
        row.0.insert("c".into(), SqlValue::Int(0));
        assert!(row.bool("a").unwrap());
        assert!(row.bool("b").unwrap());
        assert!(!row.bool("c").unwrap());
    }
}
