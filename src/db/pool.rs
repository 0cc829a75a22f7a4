//! Process-wide pool of read-only SQLite connections.
//!
//! Lifecycle is `Open -> Closing -> Closed`. While open, [`StorePool::acquire`]
//! waits for a semaphore permit and hands out a [`PooledConnection`] that
//! returns its connection on drop. [`StorePool::close`] closes the
//! semaphore, so waiters and later acquisitions fail at once with
//! [`CpgError::Unavailable`].

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::db::schema::open_read_only;
use crate::error::{CpgError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub size: usize,
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            size: 2,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

pub struct StorePool {
    state: RwLock<PoolState>,
    idle: Mutex<Vec<Connection>>,
    available: Arc<Semaphore>,
    acquire_timeout: Duration,
    size: usize,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for StorePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorePool")
            .field("state", &self.state())
            .field("size", &self.size)
            .field("available", &self.available.available_permits())
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn closed() -> CpgError {
    CpgError::Unavailable("store pool is closed".into())
}

impl StorePool {
    /// Open `options.size` read-only connections to `path` up front, so a
    /// missing or corrupt database fails at startup rather than on the
    /// first request.
    pub fn open(path: &Path, options: PoolOptions) -> Result<Self> {
        if options.size == 0 {
            return Err(CpgError::Config("pool size must be at least 1".into()));
        }
        let conns = (0..options.size)
            .map(|_| open_read_only(path))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::info!(
            "store pool open: {} connection(s) to {}",
            conns.len(),
            path.display()
        );
        let mut pool = Self::from_connections(conns, options.acquire_timeout);
        pool.path = Some(path.to_path_buf());
        Ok(pool)
    }

    /// Build a pool around connections the caller already opened. Used with
    /// `:memory:` databases, which cannot be reopened by path.
    pub fn from_connections(conns: Vec<Connection>, acquire_timeout: Duration) -> Self {
        Self {
            state: RwLock::new(PoolState::Open),
            size: conns.len(),
            available: Arc::new(Semaphore::new(conns.len())),
            idle: Mutex::new(conns),
            acquire_timeout,
            path: None,
        }
    }

    pub fn state(&self) -> PoolState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_open(&self) -> bool {
        self.state() == PoolState::Open
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Check out a connection, waiting up to the acquire timeout when every
    /// connection is in use.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        let permit = match tokio::time::timeout(
            self.acquire_timeout,
            Arc::clone(&self.available).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(closed()),
            Err(_) => return Err(CpgError::Unavailable("store pool exhausted".into())),
        };
        if !self.is_open() {
            return Err(closed());
        }
        // One idle connection per outstanding permit, unless close() drained them.
        let conn = self
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .ok_or_else(closed)?;
        Ok(PooledConnection {
            pool: Arc::clone(self),
            conn: Some(conn),
            _permit: permit,
        })
    }

    /// Tear the pool down. Idempotent. Connections checked out at this point
    /// are discarded when their guards drop.
    pub fn close(&self) {
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if *state != PoolState::Open {
                return;
            }
            *state = PoolState::Closing;
        }
        tracing::info!("store pool closing");

        self.available.close();
        let drained = {
            let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *idle)
        };
        drop(drained);

        *self.state.write().unwrap_or_else(|e| e.into_inner()) = PoolState::Closed;
        tracing::info!("store pool closed");
    }

    fn release(&self, conn: Connection) {
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_open() {
            idle.push(conn);
        }
    }
}

/// A checked-out connection. The connection goes back to the idle list on
/// drop, before the permit is released.
pub struct PooledConnection {
    pool: Arc<StorePool>,
    conn: Option<Connection>,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("connection is only taken out in Drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
