//! `StoreEngine` — the facade the API layer and synchronization
//! workers talk to.
//!
//! Owns the `DatabaseManager` (single write connection + read pool).
//! All reads go through `with_reader()`, all writes through
//! `with_writer()`; commit and cleanup each run as one `BEGIN
//! IMMEDIATE` transaction, so a cancelled or failed operation rolls
//! back completely — there is no partial retirement-without-insert.

use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Transaction, TransactionBehavior};
use tracing::warn;

use hindsight_core::errors::{StoreError, StoreResult};
use hindsight_core::record::{AccessMask, OwnerId, RecordShape};
use hindsight_core::StoreConfig;

use crate::connection::DatabaseManager;
use crate::queries::{cleanup_ops, lifeline_ops, metadata_ops, scan_ops};
use crate::schema;

pub use crate::queries::scan_ops::{ScanDirection, ScanRequest};

/// Reject reads whose caller capability does not cover the shape's mask.
fn authorize<S: RecordShape>(granted: AccessMask) -> StoreResult<()> {
    if !granted.covers(S::MASK) {
        return Err(StoreError::InvalidState {
            reason: format!(
                "capability {:#x} does not cover {:#x} required for {}",
                granted.bits(),
                S::MASK.bits(),
                S::TABLE
            ),
        });
    }
    Ok(())
}

/// The mirror store engine.
pub struct StoreEngine {
    db: DatabaseManager,
    config: StoreConfig,
}

impl StoreEngine {
    /// Open a file-backed store. Runs migrations and applies pragmas.
    pub fn open(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        let db = DatabaseManager::open(path, &config)?;
        Ok(StoreEngine { db, config })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory(config: StoreConfig) -> StoreResult<Self> {
        let db = DatabaseManager::open_in_memory(&config)?;
        Ok(StoreEngine { db, config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Create the backing table for a shape, if missing.
    pub fn ensure_shape<S: RecordShape>(&self) -> StoreResult<()> {
        self.db.with_writer(schema::create_shape_table::<S>)
    }

    /// The sole write path for versioned records.
    ///
    /// The read-compare-retire-insert sequence runs as one immediate
    /// transaction; transient busy failures are retried up to the
    /// configured budget, which is safe precisely because the failed
    /// transaction rolled back as a whole.
    pub fn commit<S: RecordShape + Clone>(&self, record: S) -> StoreResult<S> {
        let retries = self.config.effective_commit_retries();
        let mut attempt = 0;
        loop {
            let candidate = record.clone();
            let result = self.db.with_writer(|conn| {
                let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
                let committed = lifeline_ops::commit_in_tx(&tx, candidate)?;
                tx.commit()?;
                Ok(committed)
            });
            match result {
                Err(e) if e.is_transient() && attempt < retries => {
                    attempt += 1;
                    warn!(table = S::TABLE, attempt, "commit hit busy store, retrying");
                }
                other => return other,
            }
        }
    }

    /// The version visible at `at` for owner + natural key, if any.
    pub fn get<S: RecordShape>(
        &self,
        granted: AccessMask,
        owner: OwnerId,
        natural_key: &[(&'static str, Value)],
        at: i64,
    ) -> StoreResult<Option<S>> {
        authorize::<S>(granted)?;
        self.db
            .with_reader(|conn| lifeline_ops::point_in_time(conn, owner, natural_key, at))
    }

    /// Filtered, cursor-paginated scan. The limit is clamped to the
    /// configured ceiling regardless of what the caller asks for.
    pub fn scan<S: RecordShape>(
        &self,
        granted: AccessMask,
        request: &ScanRequest,
        limit: Option<usize>,
    ) -> StoreResult<Vec<S>> {
        authorize::<S>(granted)?;
        let limit = self.config.clamp_limit(limit);
        self.db
            .with_reader(|conn| scan_ops::scan(conn, request, limit))
    }

    pub fn set_metadata(&self, cid: i64, key: &str, value: &str) -> StoreResult<()> {
        self.db
            .with_writer(|conn| metadata_ops::set_metadata(conn, cid, key, value))
    }

    pub fn get_metadata(&self, cid: i64, key: &str) -> StoreResult<Option<String>> {
        self.db
            .with_reader(|conn| metadata_ops::get_metadata(conn, cid, key))
    }

    pub fn delete_metadata(&self, cid: i64, key: &str) -> StoreResult<bool> {
        self.db
            .with_writer(|conn| metadata_ops::delete_metadata(conn, cid, key))
    }

    pub fn list_metadata(&self, cid: i64) -> StoreResult<Vec<(String, String)>> {
        self.db
            .with_reader(|conn| metadata_ops::list_metadata(conn, cid))
    }

    /// Delete all history for an owner under one transaction.
    pub fn cleanup_owner<S: RecordShape>(&self, owner: OwnerId) -> StoreResult<usize> {
        self.db.with_writer(|conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
            let removed = cleanup_ops::cleanup_owner::<S>(&tx, owner)?;
            tx.commit()?;
            Ok(removed)
        })
    }

    /// Total history rows for an owner.
    pub fn count_history<S: RecordShape>(&self, owner: OwnerId) -> StoreResult<i64> {
        self.db
            .with_reader(|conn| lifeline_ops::count_rows::<S>(conn, owner))
    }

    /// Live rows for an owner.
    pub fn count_live<S: RecordShape>(&self, owner: OwnerId) -> StoreResult<i64> {
        self.db
            .with_reader(|conn| lifeline_ops::count_live_rows::<S>(conn, owner))
    }
}
