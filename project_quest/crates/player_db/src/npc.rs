use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::RepoError;
use crate::records::NpcRecord;

const NPC_COLUMNS: &str = "id, name, map, x, y, active, last_defeated_at, respawn_sec";

fn npc_from_row(row: &Row<'_>) -> rusqlite::Result<NpcRecord> {
    Ok(NpcRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        map: row.get(2)?,
        x: row.get(3)?,
        y: row.get(4)?,
        active: row.get(5)?,
        last_defeated_at: row.get(6)?,
        respawn_seconds: row.get(7)?,
    })
}

/// Repository for the NPC roster. Rows are seeded once and only toggled.
pub struct NpcRepo<'a> {
    conn: &'a Connection,
}

impl<'a> NpcRepo<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Every NPC placed on `map`, active or not.
    pub fn list_by_map(&self, map: &str) -> Result<Vec<NpcRecord>, RepoError> {
        let sql = format!("SELECT {NPC_COLUMNS} FROM npcs WHERE map = ?1 ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let npcs = stmt
            .query_map(rusqlite::params![map], npc_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(npcs)
    }

    pub fn get(&self, id: i64) -> Result<Option<NpcRecord>, RepoError> {
        let sql = format!("SELECT {NPC_COLUMNS} FROM npcs WHERE id = ?1");
        let npc = self
            .conn
            .query_row(&sql, rusqlite::params![id], npc_from_row)
            .optional()?;
        Ok(npc)
    }

    /// Check-then-set: returns true only for the caller that flipped the NPC.
    pub fn deactivate(&self, id: i64, at: DateTime<Utc>) -> Result<bool, RepoError> {
        deactivate_if_active(self.conn, id, at)
    }

    /// Inactive NPCs whose respawn delay has elapsed at `now`.
    pub fn find_respawnable(&self, now: DateTime<Utc>) -> Result<Vec<NpcRecord>, RepoError> {
        let sql = format!("SELECT {NPC_COLUMNS} FROM npcs WHERE active = 0 ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let inactive = stmt
            .query_map([], npc_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(inactive
            .into_iter()
            // Inactive without a defeat time never comes back on its own.
            .filter(|npc| npc.respawn_due_at().is_some_and(|due| due <= now))
            .collect())
    }

    /// Returns true when the NPC was inactive and is now active again.
    pub fn reactivate(&self, id: i64) -> Result<bool, RepoError> {
        let rows = self.conn.execute(
            "UPDATE npcs SET active = 1, last_defeated_at = NULL WHERE id = ?1 AND active = 0",
            rusqlite::params![id],
        )?;
        Ok(rows == 1)
    }
}

pub(crate) fn deactivate_if_active(
    conn: &Connection,
    id: i64,
    at: DateTime<Utc>,
) -> Result<bool, RepoError> {
    let rows = conn.execute(
        "UPDATE npcs SET active = 0, last_defeated_at = ?1 WHERE id = ?2 AND active = 1",
        rusqlite::params![at, id],
    )?;
    Ok(rows == 1)
}
