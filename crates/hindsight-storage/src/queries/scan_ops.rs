//! Filtered, cursor-paginated scans over any record shape.
//!
//! Query assembly always constrains the owner, always applies a
//! lifeline filter, ANDs the compiled field selectors, and paginates
//! by keyset on `cid` — the only valid cursor, stable under concurrent
//! inserts because identities are monotonic and never reused.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use hindsight_core::errors::StoreResult;
use hindsight_core::record::{OwnerId, RecordShape};
use hindsight_core::selector::{FieldSelector, LifelineFilter};

use crate::queries::lifeline_ops::row_to_record;
use crate::schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Ascending,
    Descending,
}

/// A filtered scan over one shape for one owner.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub owner: OwnerId,
    pub lifeline: LifelineFilter,
    pub selectors: Vec<FieldSelector>,
    /// Last `cid` the caller has already seen; `None` starts from the
    /// beginning (or end, when descending).
    pub cursor: Option<i64>,
    pub direction: ScanDirection,
}

impl ScanRequest {
    pub fn new(owner: OwnerId, lifeline: LifelineFilter) -> Self {
        ScanRequest {
            owner,
            lifeline,
            selectors: Vec::new(),
            cursor: None,
            direction: ScanDirection::Ascending,
        }
    }

    pub fn with_selector(mut self, selector: FieldSelector) -> Self {
        self.selectors.push(selector);
        self
    }

    pub fn after(mut self, cursor: i64) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn descending(mut self) -> Self {
        self.direction = ScanDirection::Descending;
        self
    }
}

/// Execute a scan. `limit` must already be clamped by the engine.
/// Results are ordered by `cid` in the cursor direction; callers
/// re-issue with the last returned `cid` to fetch the next page.
pub fn scan<S: RecordShape>(
    conn: &Connection,
    request: &ScanRequest,
    limit: usize,
) -> StoreResult<Vec<S>> {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE owner = ?",
        schema::select_list::<S>(),
        S::TABLE
    );
    let mut bound: Vec<Value> = vec![Value::Integer(request.owner.get())];

    if let Some(fragment) = request.lifeline.compile() {
        sql.push_str(" AND ");
        sql.push_str(&fragment.clause);
        bound.extend(fragment.params);
    }

    for selector in &request.selectors {
        if let Some(fragment) = selector.compile() {
            sql.push_str(" AND ");
            sql.push_str(&fragment.clause);
            bound.extend(fragment.params);
        }
    }

    match request.direction {
        ScanDirection::Ascending => {
            sql.push_str(" AND cid > ? ORDER BY cid ASC LIMIT ?");
            bound.push(Value::Integer(request.cursor.unwrap_or(0)));
        }
        ScanDirection::Descending => {
            sql.push_str(" AND cid < ? ORDER BY cid DESC LIMIT ?");
            bound.push(Value::Integer(request.cursor.unwrap_or(i64::MAX)));
        }
    }
    bound.push(Value::Integer(limit as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(bound), row_to_record::<S>)?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}
