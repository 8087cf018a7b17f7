//! Connection management: one serialized write connection plus a
//! small pool of read-only connections.
//!
//! All writes go through `with_writer()`, all reads through
//! `with_reader()`. No code outside this crate should touch a raw
//! `&Connection`. Funneling every write through a single connection is
//! what serializes concurrent commits for the same identity — combined
//! with `BEGIN IMMEDIATE` transactions, two commits can never both
//! observe "no live record" and both insert.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use hindsight_core::errors::StoreResult;
use hindsight_core::StoreConfig;

use crate::migrations;

/// Apply the standard per-connection pragmas.
///
/// `case_sensitive_like` keeps `Like` selectors case-sensitive (SQLite
/// LIKE is ASCII-case-insensitive out of the box). Foreign keys stay
/// off: cascades are explicit in the cleanup module.
pub fn apply_pragmas(conn: &Connection, busy_timeout_ms: u32) -> StoreResult<()> {
    conn.execute_batch(&format!(
        "PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = {busy_timeout_ms};
         PRAGMA case_sensitive_like = ON;
         PRAGMA foreign_keys = OFF;"
    ))?;
    Ok(())
}

struct ReadPool {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

/// Read/write connection routing for one database.
pub struct DatabaseManager {
    writer: Mutex<Connection>,
    /// `None` for in-memory databases, where a second connection would
    /// see a different (empty) database — reads then share the writer.
    readers: Option<ReadPool>,
    path: Option<PathBuf>,
}

impl DatabaseManager {
    /// Open a file-backed database: WAL mode, pragmas, migrations,
    /// and a pool of read-only connections.
    pub fn open(path: &Path, config: &StoreConfig) -> StoreResult<Self> {
        let writer = Connection::open(path)?;
        writer.pragma_update(None, "journal_mode", "WAL")?;
        apply_pragmas(&writer, config.effective_busy_timeout_ms())?;
        migrations::run_migrations(&writer)?;

        let pool_size = config.effective_read_pool_size();
        let mut conns = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            apply_pragmas(&conn, config.effective_busy_timeout_ms())?;
            conns.push(Mutex::new(conn));
        }
        debug!(path = %path.display(), pool_size, "opened database");

        Ok(DatabaseManager {
            writer: Mutex::new(writer),
            readers: Some(ReadPool {
                conns,
                next: AtomicUsize::new(0),
            }),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing). Reads and writes
    /// share the single connection.
    pub fn open_in_memory(config: &StoreConfig) -> StoreResult<Self> {
        let writer = Connection::open_in_memory()?;
        apply_pragmas(&writer, config.effective_busy_timeout_ms())?;
        migrations::run_migrations(&writer)?;
        Ok(DatabaseManager {
            writer: Mutex::new(writer),
            readers: None,
            path: None,
        })
    }

    /// Database file path (`None` for in-memory).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run a closure against a read connection (round-robin).
    pub fn with_reader<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        match &self.readers {
            Some(pool) => {
                let idx = pool.next.fetch_add(1, Ordering::Relaxed) % pool.conns.len();
                let conn = pool.conns[idx].lock().expect("read connection poisoned");
                f(&conn)
            }
            None => self.with_writer(f),
        }
    }

    /// Run a closure against the single write connection.
    pub fn with_writer<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self.writer.lock().expect("write connection poisoned");
        f(&conn)
    }
}
