//! Process configuration from environment variables.
//!
//! Connection secrets are mandatory: a missing `DB_PASSWORD` or
//! `LDAP_BIND_PASSWORD` is a fatal startup error. Everything else has a
//! development default. Scheduler settings are not here; they live in the
//! `sync_config` table so they can be changed at runtime (see
//! [`crate::store::SyncConfigStore`]).

use {
    crate::error::Error,
    std::{env, time::Duration},
};

/// Which SQL backend the store talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbBackend {
    /// Embedded SQLite file (or in-memory), speaking the `postgres` dialect
    /// subset. The default for single-host deployments and tests.
    Sqlite,
    Postgres,
    Oracle,
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub backend:      DbBackend,
    pub host:         String,
    pub port:         u16,
    pub name:         String,
    pub user:         String,
    pub password:     String,
    pub pool_min:     usize,
    pub pool_max:     usize,
    pub pool_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct LdapConfig {
    pub host:            String,
    pub port:            u16,
    pub bind_dn:         String,
    pub bind_password:   String,
    pub base_dn:         String,
    pub network_timeout: Duration,
    pub pool_size:       usize,
}

impl LdapConfig {
    pub fn url(&self) -> String {
        format!("ldap://{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port:             u16,
    pub thread_num:       usize,
    pub max_body_size_mb: usize,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub db:     DbConfig,
    pub ldap:   LdapConfig,
    pub server: ServerConfig,
}

fn var(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &str) -> Result<String, Error> {
    env::var(name).map_err(|_| Error::ConfigMissing(name.to_string()))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Read the full configuration from the environment.
    ///
    /// Oracle deployments use the `ORACLE_*` variables for the connection
    /// while keeping `DB_TYPE=oracle`; the shared pool variables apply to
    /// either backend.
    pub fn from_env() -> Result<Self, Error> {
        let backend = match var("DB_TYPE", "sqlite").to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => DbBackend::Postgres,
            "oracle" => DbBackend::Oracle,
            _ => DbBackend::Sqlite,
        };

        let db = if backend == DbBackend::Oracle {
            DbConfig {
                backend,
                host: var("ORACLE_HOST", "localhost"),
                port: parse_var("ORACLE_PORT", 1521),
                name: var("ORACLE_SERVICE_NAME", "pkd"),
                user: var("ORACLE_USER", "pkd"),
                password: required("ORACLE_PASSWORD").or_else(|_| required("DB_PASSWORD"))?,
                pool_min: parse_var("DB_POOL_MIN", 2),
                pool_max: parse_var("DB_POOL_MAX", 10),
                pool_timeout: Duration::from_secs(parse_var("DB_POOL_TIMEOUT", 30)),
            }
        } else {
            DbConfig {
                backend,
                host: var("DB_HOST", "localhost"),
                port: parse_var("DB_PORT", 5432),
                name: var("DB_NAME", "localpkd"),
                user: var("DB_USER", "localpkd"),
                password: required("DB_PASSWORD")?,
                pool_min: parse_var("DB_POOL_MIN", 2),
                pool_max: parse_var("DB_POOL_MAX", 10),
                pool_timeout: Duration::from_secs(parse_var("DB_POOL_TIMEOUT", 30)),
            }
        };

        let ldap = LdapConfig {
            host:            var("LDAP_HOST", "localhost"),
            port:            parse_var("LDAP_PORT", 389),
            bind_dn:         var("LDAP_BIND_DN", "cn=admin,dc=pkd,dc=example,dc=com"),
            bind_password:   required("LDAP_BIND_PASSWORD")?,
            base_dn:         var("LDAP_BASE_DN", "dc=pkd,dc=example,dc=com"),
            network_timeout: Duration::from_secs(parse_var("LDAP_NETWORK_TIMEOUT", 5)),
            pool_size:       parse_var("DB_POOL_MAX", 10),
        };

        let server = ServerConfig {
            port:             parse_var("SERVER_PORT", 8080),
            thread_num:       parse_var("THREAD_NUM", 4),
            max_body_size_mb: parse_var("MAX_BODY_SIZE_MB", 32),
        };

        Ok(Self { db, ldap, server })
    }
}
