//! Shape table DDL.
//!
//! Every shape table carries the same envelope columns; the payload
//! columns come from the shape's `payload_ddl()`. `cid` is an
//! AUTOINCREMENT primary key, so identities are monotonic, never
//! reused, and assigned inside the same transaction as the insert.

use rusqlite::Connection;

use hindsight_core::errors::StoreResult;
use hindsight_core::RecordShape;

/// Create the backing table and indexes for a shape, if missing.
pub fn create_shape_table<S: RecordShape>(conn: &Connection) -> StoreResult<()> {
    let table = S::TABLE;

    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            cid         INTEGER PRIMARY KEY AUTOINCREMENT,
            owner       INTEGER NOT NULL,
            life_start  INTEGER NOT NULL,
            life_end    INTEGER NOT NULL,
            access_mask INTEGER NOT NULL"
    );
    for (name, decl) in S::payload_ddl() {
        ddl.push_str(",\n            ");
        ddl.push_str(name);
        ddl.push(' ');
        ddl.push_str(decl);
    }
    ddl.push_str("\n        );");

    conn.execute_batch(&ddl)?;
    conn.execute_batch(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_owner
             ON {table}(owner);
         CREATE INDEX IF NOT EXISTS idx_{table}_lifeline
             ON {table}(owner, life_start, life_end);"
    ))?;
    Ok(())
}

/// The SELECT column list for a shape: envelope columns first, then
/// payload columns in `payload_ddl()` order.
pub fn select_list<S: RecordShape>() -> String {
    let mut list = hindsight_core::record::ENVELOPE_COLUMNS.join(", ");
    for (name, _) in S::payload_ddl() {
        list.push_str(", ");
        list.push_str(name);
    }
    list
}
