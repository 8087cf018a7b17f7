//! v001: metadata side-table.
//!
//! Shape tables are not created here — each shape registers its table
//! through `schema::create_shape_table`, which stamps the shared
//! envelope columns onto the shape's payload DDL.

use rusqlite::Connection;

use hindsight_core::errors::StoreResult;

pub fn migrate(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS record_metadata (
            cid   INTEGER NOT NULL,
            key   TEXT NOT NULL,
            value TEXT NOT NULL,
            UNIQUE(cid, key)
        );

        CREATE INDEX IF NOT EXISTS idx_record_metadata_cid
            ON record_metadata(cid);
        ",
    )?;
    Ok(())
}
