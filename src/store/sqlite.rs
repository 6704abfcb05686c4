//! Embedded SQLite executor.
//!
//! Registers under the `postgres` dialect tag and executes the subset the
//! dialect helpers emit (boolean keywords, `LIMIT`/`OFFSET`,
//! `CURRENT_TIMESTAMP`). Connections come from a fixed pool with a bounded
//! acquisition wait; exhaustion is an error, not a deadlock.

use {
    super::{executor::Row, Dialect, QueryExecutor, SqlValue, StoreError},
    rusqlite::{Connection, ErrorCode, OpenFlags},
    std::{
        collections::VecDeque,
        path::Path,
        sync::{Condvar, Mutex},
        time::{Duration, Instant},
    },
};

#[derive(Debug)]
pub struct SqliteExecutor {
    pool:         Mutex<VecDeque<Connection>>,
    available:    Condvar,
    acquire_wait: Duration,
}

impl SqliteExecutor {
    /// Open a pool of `pool_size` connections on a database file.
    pub fn open(
        path: &Path,
        pool_size: usize,
        acquire_wait: Duration,
    ) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let mut connections = VecDeque::with_capacity(pool_size.max(1));
        for _ in 0..pool_size.max(1) {
            let conn = Connection::open_with_flags(path, flags).map_err(open_error)?;
            conn.busy_timeout(Duration::from_secs(5)).map_err(open_error)?;
            connections.push_back(conn);
        }
        Ok(Self {
            pool: Mutex::new(connections),
            available: Condvar::new(),
            acquire_wait,
        })
    }

    /// Single-connection in-memory database, for tests and tooling.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(open_error)?;
        let mut connections = VecDeque::new();
        connections.push_back(conn);
        Ok(Self {
            pool: Mutex::new(connections),
            available: Condvar::new(),
            acquire_wait: Duration::from_secs(5),
        })
    }

    /// Override the acquisition wait bound (builder style).
    pub fn with_acquire_wait(mut self, wait: Duration) -> Self {
        self.acquire_wait = wait;
        self
    }

    /// Check a connection out of the pool, waiting up to the configured
    /// bound.
    fn acquire(&self) -> Result<PooledConnection<'_>, StoreError> {
        let deadline = Instant::now() + self.acquire_wait;
        let mut pool = self
            .pool
            .lock()
            .map_err(|_| StoreError::Unavailable("connection pool poisoned".to_string()))?;
        loop {
            if let Some(conn) = pool.pop_front() {
                return Ok(PooledConnection {
                    executor: self,
                    conn: Some(conn),
                });
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(StoreError::PoolExhausted);
            }
            let (guard, timeout) = self
                .available
                .wait_timeout(pool, remaining)
                .map_err(|_| StoreError::Unavailable("connection pool poisoned".to_string()))?;
            pool = guard;
            if timeout.timed_out() && pool.is_empty() {
                return Err(StoreError::PoolExhausted);
            }
        }
    }

    fn release(&self, conn: Connection) {
        if let Ok(mut pool) = self.pool.lock() {
            pool.push_back(conn);
        }
        self.available.notify_one();
    }
}

/// Scoped pool checkout; the connection returns on every exit path.
#[derive(Debug)]
struct PooledConnection<'a> {
    executor: &'a SqliteExecutor,
    conn:     Option<Connection>,
}

impl PooledConnection<'_> {
    fn conn(&self) -> &Connection {
        self.conn.as_ref().expect("present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.executor.release(conn);
        }
    }
}

/// SQLite treats `$1` as a named parameter; rewrite to the `?N` numbered
/// form so positional binding lines up.
fn rewrite_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek().is_some_and(char::is_ascii_digit) {
            out.push('?');
        } else {
            out.push(ch);
        }
    }
    out
}

fn bind_value(value: &SqlValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Int(v) => Value::Integer(*v),
        SqlValue::Real(v) => Value::Real(*v),
        SqlValue::Text(v) => Value::Text(v.clone()),
        SqlValue::Blob(v) => Value::Blob(v.clone()),
        SqlValue::Bool(v) => Value::Integer(i64::from(*v)),
    }
}

fn open_error(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn map_error(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(inner, _) = &e {
        if inner.code == ErrorCode::ConstraintViolation {
            return StoreError::UniqueViolation;
        }
    }
    StoreError::Unavailable(e.to_string())
}

impl QueryExecutor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StoreError> {
        let pooled = self.acquire()?;
        let sql = rewrite_placeholders(sql);
        let mut statement = pooled.conn().prepare(&sql).map_err(map_error)?;
        let column_names: Vec<String> = statement
            .column_names()
            .iter()
            .map(|name| name.to_lowercase())
            .collect();

        let bound: Vec<rusqlite::types::Value> = params.iter().map(bind_value).collect();
        let mut rows = statement
            .query(rusqlite::params_from_iter(bound))
            .map_err(map_error)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_error)? {
            let mut mapped = Row::default();
            for (index, name) in column_names.iter().enumerate() {
                let value = match row.get_ref(index).map_err(map_error)? {
                    rusqlite::types::ValueRef::Null => SqlValue::Null,
                    rusqlite::types::ValueRef::Integer(v) => SqlValue::Int(v),
                    rusqlite::types::ValueRef::Real(v) => SqlValue::Real(v),
                    rusqlite::types::ValueRef::Text(v) => {
                        SqlValue::Text(String::from_utf8_lossy(v).into_owned())
                    }
                    rusqlite::types::ValueRef::Blob(v) => SqlValue::Blob(v.to_vec()),
                };
                mapped.0.insert(name.clone(), value);
            }
            out.push(mapped);
        }
        Ok(out)
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, StoreError> {
        let pooled = self.acquire()?;
        let sql = rewrite_placeholders(sql);
        let bound: Vec<rusqlite::types::Value> = params.iter().map(bind_value).collect();
        pooled
            .conn()
            .execute(&sql, rusqlite::params_from_iter(bound))
            .map_err(map_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_rewrite() {
        assert_eq!(
            rewrite_placeholders("SELECT a FROM t WHERE b = $1 AND c = $12"),
            "SELECT a FROM t WHERE b = ?1 AND c = ?12"
        );
        assert_eq!(rewrite_placeholders("SELECT '$' FROM t"), "SELECT '$' FROM t");
    }

    #[test]
    fn pool_exhaustion_is_reported() {
        let executor = SqliteExecutor::in_memory()
            .unwrap()
            .with_acquire_wait(Duration::from_millis(10));
        let held = executor.acquire().unwrap();
        let err = executor.acquire().unwrap_err();
        assert!(matches!(err, StoreError::PoolExhausted));
        drop(held);
        assert!(executor.acquire().is_ok());
    }
}
