//! Bounded key/value metadata attached to individual record versions.
//!
//! `(cid, key)` is unique. Keys are 1..=`METADATA_MAX_LEN` UTF-8 code
//! units, values at most `METADATA_MAX_LEN`; a record holds at most
//! `METADATA_MAX_KEYS` distinct keys. Overwriting an existing key
//! never counts against the key limit.

use rusqlite::{params, Connection, OptionalExtension};

use hindsight_core::config::{METADATA_MAX_KEYS, METADATA_MAX_LEN};
use hindsight_core::errors::{StoreError, StoreResult};

/// Set or overwrite one metadata entry.
pub fn set_metadata(conn: &Connection, cid: i64, key: &str, value: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::MetadataLimit {
            what: "key",
            len: 0,
            max: METADATA_MAX_LEN,
        });
    }
    if key.len() > METADATA_MAX_LEN {
        return Err(StoreError::MetadataLimit {
            what: "key",
            len: key.len(),
            max: METADATA_MAX_LEN,
        });
    }
    if value.len() > METADATA_MAX_LEN {
        return Err(StoreError::MetadataLimit {
            what: "value",
            len: value.len(),
            max: METADATA_MAX_LEN,
        });
    }

    // The count limit only applies to new keys.
    if get_metadata(conn, cid, key)?.is_none() {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM record_metadata WHERE cid = ?1",
            params![cid],
            |row| row.get(0),
        )?;
        if count as usize >= METADATA_MAX_KEYS {
            return Err(StoreError::MetadataCount {
                max: METADATA_MAX_KEYS,
            });
        }
    }

    conn.prepare_cached(
        "INSERT INTO record_metadata (cid, key, value) VALUES (?1, ?2, ?3)
         ON CONFLICT(cid, key) DO UPDATE SET value = excluded.value",
    )?
    .execute(params![cid, key, value])?;
    Ok(())
}

/// Look up one metadata entry.
pub fn get_metadata(conn: &Connection, cid: i64, key: &str) -> StoreResult<Option<String>> {
    let value = conn
        .prepare_cached("SELECT value FROM record_metadata WHERE cid = ?1 AND key = ?2")?
        .query_row(params![cid, key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

/// Delete one metadata entry. No-op if absent.
pub fn delete_metadata(conn: &Connection, cid: i64, key: &str) -> StoreResult<bool> {
    let rows = conn
        .prepare_cached("DELETE FROM record_metadata WHERE cid = ?1 AND key = ?2")?
        .execute(params![cid, key])?;
    Ok(rows > 0)
}

/// All metadata entries for a record, key order.
pub fn list_metadata(conn: &Connection, cid: i64) -> StoreResult<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare_cached("SELECT key, value FROM record_metadata WHERE cid = ?1 ORDER BY key")?;
    let rows = stmt.query_map(params![cid], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Number of distinct keys on a record.
pub fn metadata_count(conn: &Connection, cid: i64) -> StoreResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM record_metadata WHERE cid = ?1",
        params![cid],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Cascade: remove all metadata for every row of `table` owned by `owner`.
pub(crate) fn delete_for_owner(conn: &Connection, table: &str, owner: i64) -> StoreResult<usize> {
    let rows = conn.execute(
        &format!(
            "DELETE FROM record_metadata
             WHERE cid IN (SELECT cid FROM {table} WHERE owner = ?1)"
        ),
        params![owner],
    )?;
    Ok(rows)
}
