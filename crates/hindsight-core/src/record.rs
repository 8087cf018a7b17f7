//! Versioned-record envelope and the shape capability trait.
//!
//! Every mirrored record embeds an [`Envelope`]: who owns it, the
//! half-open lifeline interval `[life_start, life_end)` it was the
//! observed truth for, the capability mask required to read it, and
//! the store-assigned identity (`cid`). A record with
//! `life_end == END_OF_TIME` is the live version.
//!
//! Concrete record shapes implement [`RecordShape`] — payload column
//! mapping, natural key, and payload-only equivalence. The store
//! operates generically over that trait; no shape-specific logic
//! exists below it.

use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};

/// Sentinel `life_end` for the live version of an identity.
pub const END_OF_TIME: i64 = i64::MAX;

/// Envelope columns, in the order every shape table stores them.
/// Payload columns follow immediately after.
pub const ENVELOPE_COLUMNS: [&str; 5] =
    ["cid", "owner", "life_start", "life_end", "access_mask"];

/// Opaque reference to the account a record belongs to.
///
/// Always set by construction; non-positive ids are rejected so the
/// store never has to handle an "unset owner" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(i64);

impl OwnerId {
    pub fn new(id: i64) -> StoreResult<Self> {
        if id <= 0 {
            return Err(StoreError::InvalidState {
                reason: format!("owner id must be positive, got {id}"),
            });
        }
        Ok(OwnerId(id))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

/// Bitset naming the capability required to read a shape.
/// Constant per shape, not per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessMask(u64);

impl AccessMask {
    pub const fn new(bits: u64) -> Self {
        AccessMask(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether a caller holding `self` may read data gated by `required`.
    pub const fn covers(self, required: AccessMask) -> bool {
        self.0 & required.0 == required.0
    }
}

impl std::ops::BitOr for AccessMask {
    type Output = AccessMask;

    fn bitor(self, rhs: AccessMask) -> AccessMask {
        AccessMask(self.0 | rhs.0)
    }
}

/// The bitemporal envelope embedded in every record shape.
///
/// Timestamps are opaque monotonic milliseconds. Visibility at time
/// `T` is `life_start <= T < life_end` — inclusive start, exclusive
/// end, uniformly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub owner: OwnerId,
    pub life_start: i64,
    pub life_end: i64,
    pub access_mask: AccessMask,
    /// Store-assigned identity; `None` until first persisted.
    /// Monotonic, never reused — doubles as the pagination cursor.
    pub cid: Option<i64>,
}

impl Envelope {
    /// Start a fresh lifeline: live from `start`, no identity yet.
    pub fn begin(owner: OwnerId, start: i64, access_mask: AccessMask) -> StoreResult<Self> {
        if start < 0 {
            return Err(StoreError::InvalidState {
                reason: format!("life_start must be non-negative, got {start}"),
            });
        }
        Ok(Envelope {
            owner,
            life_start: start,
            life_end: END_OF_TIME,
            access_mask,
            cid: None,
        })
    }

    /// End this version's life at `end`. The interval stays half-open,
    /// so `end` must be strictly after `life_start`.
    pub fn retire(&mut self, end: i64) -> StoreResult<()> {
        if end <= self.life_start {
            return Err(StoreError::InvalidState {
                reason: format!(
                    "retirement time {end} is not after life_start {}",
                    self.life_start
                ),
            });
        }
        self.life_end = end;
        Ok(())
    }

    /// Copy owner, lifeline, mask, and identity from `source`.
    /// Payload and metadata are never copied.
    pub fn adopt(&mut self, source: &Envelope) {
        self.owner = source.owner;
        self.life_start = source.life_start;
        self.life_end = source.life_end;
        self.access_mask = source.access_mask;
        self.cid = source.cid;
    }

    pub fn is_live(&self) -> bool {
        self.life_end == END_OF_TIME
    }

    pub fn visible_at(&self, t: i64) -> bool {
        self.life_start <= t && t < self.life_end
    }
}

/// Self-referential containment declaration for shapes whose records
/// may contain other records of the same shape (nested items).
/// `container_column` holds the `id_column` value of the parent row.
#[derive(Debug, Clone, Copy)]
pub struct Containment {
    pub id_column: &'static str,
    pub container_column: &'static str,
}

/// Capability interface every mirrored record shape implements.
///
/// The store owns the envelope columns; shapes only describe their
/// payload. `equivalent` compares payload fields exclusively — the
/// lifeline engine uses it to decide whether a freshly fetched
/// snapshot is new or a re-observation.
pub trait RecordShape: Sized {
    /// Backing table name.
    const TABLE: &'static str;

    /// Capability required to read this shape. Constant per shape.
    const MASK: AccessMask;

    /// Set for shapes with self-referential containment; cleanup then
    /// deletes bottom-up through the containment reference.
    const CONTAINER: Option<Containment> = None;

    /// Payload columns as `(name, sqlite type declaration)` pairs,
    /// in storage order.
    fn payload_ddl() -> &'static [(&'static str, &'static str)];

    /// Payload values in `payload_ddl()` order.
    fn payload_values(&self) -> Vec<Value>;

    /// Rebuild a record from a row. Payload columns start at index
    /// `ENVELOPE_COLUMNS.len()`; the envelope is parsed by the store.
    fn from_row(envelope: Envelope, row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Shape-defined natural key as `(column, value)` pairs. Together
    /// with the owner this identifies "the same logical thing" across
    /// versions. Empty for singleton shapes.
    fn natural_key(&self) -> Vec<(&'static str, Value)>;

    /// Payload-only comparison; ignores the envelope entirely.
    /// Must be reflexive and symmetric.
    fn equivalent(&self, other: &Self) -> bool;

    fn envelope(&self) -> &Envelope;

    fn envelope_mut(&mut self) -> &mut Envelope;

    /// Recompute display-only fields after load. Pure and idempotent;
    /// the default does nothing.
    fn refresh_derived(&mut self) {}
}
