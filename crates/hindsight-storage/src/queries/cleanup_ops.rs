//! Owner eviction: bulk deletion of all history for an owner,
//! metadata included.
//!
//! Shapes with self-referential containment are deleted bottom-up.
//! The hierarchy is discovered with an explicit worklist (breadth-first
//! over the containment reference), then deleted deepest level first —
//! no recursion, so arbitrarily deep nesting cannot overflow the stack.

use std::collections::HashSet;

use rusqlite::{params, params_from_iter, Connection};
use tracing::{info, warn};

use hindsight_core::errors::StoreResult;
use hindsight_core::record::{Containment, OwnerId, RecordShape};

use crate::queries::metadata_ops;

/// Delete every version of every record of shape `S` for `owner`,
/// plus cascaded metadata. Returns the number of record rows removed.
pub fn cleanup_owner<S: RecordShape>(conn: &Connection, owner: OwnerId) -> StoreResult<usize> {
    let removed = match S::CONTAINER {
        None => {
            metadata_ops::delete_for_owner(conn, S::TABLE, owner.get())?;
            conn.execute(
                &format!("DELETE FROM {} WHERE owner = ?1", S::TABLE),
                params![owner.get()],
            )?
        }
        Some(containment) => cleanup_nested::<S>(conn, owner, containment)?,
    };
    info!(
        table = S::TABLE,
        owner = owner.get(),
        removed,
        "owner history evicted"
    );
    Ok(removed)
}

struct NodeRow {
    cid: i64,
    id: i64,
    container: Option<i64>,
}

fn cleanup_nested<S: RecordShape>(
    conn: &Connection,
    owner: OwnerId,
    containment: Containment,
) -> StoreResult<usize> {
    let mut stmt = conn.prepare(&format!(
        "SELECT cid, {}, {} FROM {} WHERE owner = ?1",
        containment.id_column,
        containment.container_column,
        S::TABLE
    ))?;
    let rows = stmt.query_map(params![owner.get()], |row| {
        Ok(NodeRow {
            cid: row.get(0)?,
            id: row.get(1)?,
            container: row.get(2)?,
        })
    })?;

    let mut nodes = Vec::new();
    for row in rows {
        nodes.push(row?);
    }

    let ids: HashSet<i64> = nodes.iter().map(|n| n.id).collect();

    // Worklist traversal: roots are rows whose container reference is
    // absent or points outside the owner's rows. Each pass collects
    // the rows contained by the previous level.
    let mut levels: Vec<Vec<i64>> = Vec::new();
    let mut visited: HashSet<i64> = HashSet::new();
    let mut frontier: HashSet<i64> = HashSet::new();

    let roots: Vec<&NodeRow> = nodes
        .iter()
        .filter(|n| n.container.map_or(true, |c| !ids.contains(&c)))
        .collect();
    if !roots.is_empty() {
        frontier = roots.iter().map(|n| n.id).collect();
        levels.push(roots.iter().map(|n| n.cid).collect());
        visited.extend(levels[0].iter().copied());
    }

    while !frontier.is_empty() {
        let next: Vec<&NodeRow> = nodes
            .iter()
            .filter(|n| {
                !visited.contains(&n.cid) && n.container.is_some_and(|c| frontier.contains(&c))
            })
            .collect();
        if next.is_empty() {
            break;
        }
        frontier = next.iter().map(|n| n.id).collect();
        let cids: Vec<i64> = next.iter().map(|n| n.cid).collect();
        visited.extend(cids.iter().copied());
        levels.push(cids);
    }

    // Rows a traversal can never reach (containment cycle). Still
    // deleted, but loudly.
    let stranded: Vec<i64> = nodes
        .iter()
        .filter(|n| !visited.contains(&n.cid))
        .map(|n| n.cid)
        .collect();
    if !stranded.is_empty() {
        warn!(
            table = S::TABLE,
            owner = owner.get(),
            count = stranded.len(),
            "containment cycle detected during cleanup"
        );
        levels.push(stranded);
    }

    // Leaves before parents: delete deepest level first.
    let mut removed = 0;
    for level in levels.iter().rev() {
        removed += delete_cids(conn, S::TABLE, level)?;
    }
    Ok(removed)
}

/// Delete rows by cid in bounded chunks, metadata first.
fn delete_cids(conn: &Connection, table: &str, cids: &[i64]) -> StoreResult<usize> {
    let mut removed = 0;
    for chunk in cids.chunks(500) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        conn.execute(
            &format!("DELETE FROM record_metadata WHERE cid IN ({placeholders})"),
            params_from_iter(chunk.iter().copied()),
        )?;
        removed += conn.execute(
            &format!("DELETE FROM {table} WHERE cid IN ({placeholders})"),
            params_from_iter(chunk.iter().copied()),
        )?;
    }
    Ok(removed)
}
