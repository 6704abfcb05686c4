//! SQL dialect helpers.
//!
//! The two supported server dialects differ in boolean literals,
//! pagination syntax, timestamp functions and BLOB hex input. Repository
//! code never branches on the backend at a call site; it asks the dialect.
//! The embedded SQLite executor registers as `Postgres` and speaks the
//! subset these helpers emit.

use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Oracle,
}

impl Dialect {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Oracle => "oracle",
        }
    }

    /// Server-side "now" expression for inline use in INSERTs.
    pub fn current_timestamp(self) -> &'static str {
        match self {
            Self::Postgres => "CURRENT_TIMESTAMP",
            Self::Oracle => "SYSTIMESTAMP",
        }
    }

    /// Boolean literal for inline predicates (`stored_in_ldap = FALSE`).
    pub fn bool_literal(self, value: bool) -> &'static str {
        match (self, value) {
            (Self::Postgres, true) => "TRUE",
            (Self::Postgres, false) => "FALSE",
            (Self::Oracle, true) => "1",
            (Self::Oracle, false) => "0",
        }
    }

    /// Pagination tail for history queries.
    pub fn pagination_clause(self, limit: i64, offset: i64) -> String {
        match self {
            Self::Postgres => format!("LIMIT {limit} OFFSET {offset}"),
            Self::Oracle => {
                format!("OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY")
            }
        }
    }

    /// Single-row limit tail (`find latest` style queries).
    pub fn limit_clause(self, limit: i64) -> String {
        match self {
            Self::Postgres => format!("LIMIT {limit}"),
            Self::Oracle => format!("FETCH FIRST {limit} ROWS ONLY"),
        }
    }

    /// Prefix for hex-rendered binary columns in text form.
    pub fn hex_prefix(self) -> &'static str {
        match self {
            Self::Postgres => "\\x",
            Self::Oracle => "",
        }
    }

    /// Client-side id generation, uniform across backends.
    ///
    /// Sidesteps the sequence-vs-UUID split and the `RETURNING` clause the
    /// server dialects disagree on.
    pub fn generate_id(self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_syntax_per_dialect() {
        assert_eq!(Dialect::Postgres.pagination_clause(20, 40), "LIMIT 20 OFFSET 40");
        assert_eq!(
            Dialect::Oracle.pagination_clause(20, 40),
            "OFFSET 40 ROWS FETCH NEXT 20 ROWS ONLY"
        );
    }

    #[test]
    fn boolean_literals_per_dialect() {
        assert_eq!(Dialect::Postgres.bool_literal(false), "FALSE");
        assert_eq!(Dialect::Oracle.bool_literal(false), "0");
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(Dialect::Postgres.generate_id(), Dialect::Postgres.generate_id());
    }
}
