//! Lifeline engine: the sole write path for versioned records, plus
//! point-in-time lookup.
//!
//! `commit_in_tx` must run inside a write transaction — the engine
//! wraps it in `BEGIN IMMEDIATE` so the read-compare-retire-insert
//! sequence is atomic per owner + natural key.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::debug;

use hindsight_core::errors::{StoreError, StoreResult};
use hindsight_core::record::{AccessMask, Envelope, OwnerId, RecordShape, END_OF_TIME};

use crate::schema;

/// Parse the envelope columns (always the first five) of a row.
pub(crate) fn parse_envelope(row: &Row<'_>) -> rusqlite::Result<Envelope> {
    let cid: i64 = row.get(0)?;
    let owner_raw: i64 = row.get(1)?;
    let owner = OwnerId::new(owner_raw)
        .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(1, owner_raw))?;
    let mask: i64 = row.get(4)?;
    Ok(Envelope {
        owner,
        life_start: row.get(2)?,
        life_end: row.get(3)?,
        access_mask: AccessMask::new(mask as u64),
        cid: Some(cid),
    })
}

/// Rebuild a full record from a row and re-run its derived projection.
pub(crate) fn row_to_record<S: RecordShape>(row: &Row<'_>) -> rusqlite::Result<S> {
    let envelope = parse_envelope(row)?;
    let mut record = S::from_row(envelope, row)?;
    record.refresh_derived();
    Ok(record)
}

/// Find the current live version for owner + natural key.
///
/// Finding more than one live row is an `InvariantViolation` — the
/// store is in a state the engine must not silently repair.
pub fn find_live<S: RecordShape>(
    conn: &Connection,
    owner: OwnerId,
    natural_key: &[(&'static str, Value)],
) -> StoreResult<Option<S>> {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE owner = ? AND life_end = ?",
        schema::select_list::<S>(),
        S::TABLE
    );
    let mut bound: Vec<Value> = vec![Value::Integer(owner.get()), Value::Integer(END_OF_TIME)];
    for (column, value) in natural_key {
        sql.push_str(&format!(" AND {column} = ?"));
        bound.push(value.clone());
    }

    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params_from_iter(bound), row_to_record::<S>)?;

    let mut found: Option<S> = None;
    for row in rows {
        let record = row?;
        if found.is_some() {
            return Err(StoreError::InvariantViolation {
                details: format!(
                    "multiple live versions in {} for owner {}",
                    S::TABLE,
                    owner.get()
                ),
            });
        }
        found = Some(record);
    }
    Ok(found)
}

/// Insert a record and assign its identity from the insert itself.
pub fn insert<S: RecordShape>(conn: &Connection, record: &mut S) -> StoreResult<()> {
    let ddl = S::payload_ddl();
    let mut columns = String::from("owner, life_start, life_end, access_mask");
    for (name, _) in ddl {
        columns.push_str(", ");
        columns.push_str(name);
    }
    let mut placeholders = String::from("?, ?, ?, ?");
    for _ in ddl {
        placeholders.push_str(", ?");
    }

    let env = record.envelope();
    let mut bound: Vec<Value> = vec![
        Value::Integer(env.owner.get()),
        Value::Integer(env.life_start),
        Value::Integer(env.life_end),
        Value::Integer(env.access_mask.bits() as i64),
    ];
    bound.extend(record.payload_values());

    conn.prepare_cached(&format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        S::TABLE
    ))?
    .execute(params_from_iter(bound))?;

    record.envelope_mut().cid = Some(conn.last_insert_rowid());
    Ok(())
}

/// Retire a live row at `end`. The `life_end` guard ensures only the
/// live version can be retired; losing the race is an invariant
/// violation, not something to paper over.
pub fn retire_row(conn: &Connection, table: &str, cid: i64, end: i64) -> StoreResult<()> {
    let rows = conn
        .prepare_cached(&format!(
            "UPDATE {table} SET life_end = ? WHERE cid = ? AND life_end = ?"
        ))?
        .execute(params![end, cid, END_OF_TIME])?;
    if rows == 0 {
        return Err(StoreError::InvariantViolation {
            details: format!("retirement of cid {cid} in {table} matched no live row"),
        });
    }
    Ok(())
}

/// Commit a freshly observed candidate. Caller must hold a write
/// transaction.
///
/// The live row for owner + natural key is always consulted:
/// - none → insert as the first version of a new identity;
/// - payload-equivalent → discard the candidate and return the
///   existing live record untouched (re-observing unchanged data
///   never grows history);
/// - different → retire the live row at the candidate's `life_start`,
///   then insert the candidate with a fresh identity.
///
/// Identity is store-assigned: any cid on the candidate is cleared
/// before insert.
pub fn commit_in_tx<S: RecordShape>(conn: &Connection, mut record: S) -> StoreResult<S> {
    if !record.envelope().is_live() {
        return Err(StoreError::InvalidState {
            reason: "commit candidate must be live (life_end = END_OF_TIME)".to_string(),
        });
    }

    let natural_key = record.natural_key();
    let owner = record.envelope().owner;
    let existing: Option<S> = find_live(conn, owner, &natural_key)?;

    let Some(mut live) = existing else {
        record.envelope_mut().cid = None;
        insert(conn, &mut record)?;
        debug!(
            table = S::TABLE,
            owner = owner.get(),
            cid = record.envelope().cid,
            "inserted first version"
        );
        return Ok(record);
    };

    if live.equivalent(&record) {
        debug!(
            table = S::TABLE,
            owner = owner.get(),
            cid = live.envelope().cid,
            "re-observation, history unchanged"
        );
        return Ok(live);
    }

    let transition = record.envelope().life_start;
    if transition <= live.envelope().life_start {
        return Err(StoreError::InvariantViolation {
            details: format!(
                "candidate life_start {transition} is not after live life_start {} in {}",
                live.envelope().life_start,
                S::TABLE
            ),
        });
    }

    let live_cid = live.envelope().cid.ok_or_else(|| StoreError::InvariantViolation {
        details: format!("live row in {} has no cid", S::TABLE),
    })?;
    live.envelope_mut().retire(transition)?;
    retire_row(conn, S::TABLE, live_cid, transition)?;

    record.envelope_mut().cid = None;
    insert(conn, &mut record)?;
    debug!(
        table = S::TABLE,
        owner = owner.get(),
        retired = live_cid,
        cid = record.envelope().cid,
        "superseded live version"
    );
    Ok(record)
}

/// The version of an identity whose lifeline contains `t`, if any.
pub fn point_in_time<S: RecordShape>(
    conn: &Connection,
    owner: OwnerId,
    natural_key: &[(&'static str, Value)],
    t: i64,
) -> StoreResult<Option<S>> {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE owner = ? AND life_start <= ? AND life_end > ?",
        schema::select_list::<S>(),
        S::TABLE
    );
    let mut bound: Vec<Value> = vec![
        Value::Integer(owner.get()),
        Value::Integer(t),
        Value::Integer(t),
    ];
    for (column, value) in natural_key {
        sql.push_str(&format!(" AND {column} = ?"));
        bound.push(value.clone());
    }

    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params_from_iter(bound), row_to_record::<S>)?;

    let mut found: Option<S> = None;
    for row in rows {
        let record = row?;
        if found.is_some() {
            return Err(StoreError::InvariantViolation {
                details: format!(
                    "overlapping lifelines in {} for owner {} at t {t}",
                    S::TABLE,
                    owner.get()
                ),
            });
        }
        found = Some(record);
    }
    Ok(found)
}

/// Total history rows for an owner.
pub fn count_rows<S: RecordShape>(conn: &Connection, owner: OwnerId) -> StoreResult<i64> {
    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE owner = ?1", S::TABLE),
        params![owner.get()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Live rows for an owner.
pub fn count_live_rows<S: RecordShape>(conn: &Connection, owner: OwnerId) -> StoreResult<i64> {
    let count = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE owner = ?1 AND life_end = ?2",
            S::TABLE
        ),
        params![owner.get(), END_OF_TIME],
        |row| row.get(0),
    )?;
    Ok(count)
}
