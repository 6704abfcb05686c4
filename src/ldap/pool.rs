//! Fixed-capacity pool of bound LDAP connections.
//!
//! Checkout is scoped: the handle returns its connection on every exit
//! path. A handle whose operation failed is marked unhealthy and its
//! connection is discarded instead of returned; the next checkout binds a
//! fresh one. Acquisition under contention waits up to the configured
//! bound, then fails with [`DirectoryError::PoolExhausted`].

use {
    super::DirectoryError,
    crate::config::LdapConfig,
    ldap3::{LdapConn, LdapConnSettings},
    std::{
        ops::{Deref, DerefMut},
        sync::{Condvar, Mutex},
        time::{Duration, Instant},
    },
    tracing::debug,
};

struct PoolState {
    idle:   Vec<LdapConn>,
    in_use: usize,
}

pub struct LdapPool {
    config:       LdapConfig,
    capacity:     usize,
    acquire_wait: Duration,
    state:        Mutex<PoolState>,
    available:    Condvar,
}

impl LdapPool {
    /// Create a pool; connections are bound lazily on first checkout.
    pub fn new(config: LdapConfig) -> Self {
        let capacity = config.pool_size.max(1);
        Self {
            config,
            capacity,
            acquire_wait: Duration::from_secs(10),
            state: Mutex::new(PoolState {
                idle:   Vec::new(),
                in_use: 0,
            }),
            available: Condvar::new(),
        }
    }

    pub fn with_acquire_wait(mut self, wait: Duration) -> Self {
        self.acquire_wait = wait;
        self
    }

    fn connect(&self) -> Result<LdapConn, DirectoryError> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.config.network_timeout);
        let mut conn = LdapConn::with_settings(settings, &self.config.url())
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))?;
        conn.simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .map_err(|e| DirectoryError::Unreachable(e.to_string()))?
            .success()
            .map_err(|e| DirectoryError::Unreachable(format!("bind failed: {e}")))?;
        debug!(url = %self.config.url(), "LDAP connection bound");
        Ok(conn)
    }

    /// Check a bound connection out of the pool.
    pub fn acquire(&self) -> Result<LdapHandle<'_>, DirectoryError> {
        let deadline = Instant::now() + self.acquire_wait;
        let mut state = self
            .state
            .lock()
            .map_err(|_| DirectoryError::Unreachable("pool poisoned".to_string()))?;
        loop {
            if let Some(conn) = state.idle.pop() {
                state.in_use += 1;
                return Ok(LdapHandle {
                    pool:      self,
                    conn:      Some(conn),
                    unhealthy: false,
                });
            }
            if state.idle.len() + state.in_use < self.capacity {
                state.in_use += 1;
                drop(state);
                match self.connect() {
                    Ok(conn) => {
                        return Ok(LdapHandle {
                            pool:      self,
                            conn:      Some(conn),
                            unhealthy: false,
                        })
                    }
                    Err(error) => {
                        self.checkin(None);
                        return Err(error);
                    }
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DirectoryError::PoolExhausted);
            }
            let (guard, timeout) = self
                .available
                .wait_timeout(state, remaining)
                .map_err(|_| DirectoryError::Unreachable("pool poisoned".to_string()))?;
            state = guard;
            if timeout.timed_out()
                && state.idle.is_empty()
                && state.idle.len() + state.in_use >= self.capacity
            {
                return Err(DirectoryError::PoolExhausted);
            }
        }
    }

    fn checkin(&self, conn: Option<LdapConn>) {
        if let Ok(mut state) = self.state.lock() {
            state.in_use = state.in_use.saturating_sub(1);
            if let Some(conn) = conn {
                state.idle.push(conn);
            }
        }
        self.available.notify_one();
    }
}

/// Scoped checkout of one bound connection.
pub struct LdapHandle<'a> {
    pool:      &'a LdapPool,
    conn:      Option<LdapConn>,
    unhealthy: bool,
}

impl LdapHandle<'_> {
    /// Discard this connection on release instead of returning it; the
    /// pool binds a replacement on demand.
    pub fn mark_unhealthy(&mut self) {
        self.unhealthy = true;
    }
}

impl Deref for LdapHandle<'_> {
    type Target = LdapConn;

    fn deref(&self) -> &LdapConn {
        self.conn.as_ref().expect("present until drop")
    }
}

impl DerefMut for LdapHandle<'_> {
    fn deref_mut(&mut self) -> &mut LdapConn {
        self.conn.as_mut().expect("present until drop")
    }
}

impl Drop for LdapHandle<'_> {
    fn drop(&mut self) {
        let conn = self.conn.take();
        if self.unhealthy {
            debug!("discarding unhealthy LDAP connection");
            self.pool.checkin(None);
        } else {
            self.pool.checkin(conn);
        }
    }
}
