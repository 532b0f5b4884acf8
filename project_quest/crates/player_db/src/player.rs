use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::RepoError;
use crate::records::{PlayerRecord, PlayerStatsPatch, RankingEntry, SpawnPoint};

const PLAYER_COLUMNS: &str =
    "id, name, level, exp, hp, max_hp, coins, wins, losses, last_map, x, y";

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<PlayerRecord> {
    Ok(PlayerRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        level: row.get(2)?,
        exp: row.get(3)?,
        hp: row.get(4)?,
        max_hp: row.get(5)?,
        coins: row.get(6)?,
        wins: row.get(7)?,
        losses: row.get(8)?,
        map: row.get(9)?,
        x: row.get(10)?,
        y: row.get(11)?,
    })
}

/// Repository for player operations.
pub struct PlayerRepo<'a> {
    conn: &'a Connection,
}

impl<'a> PlayerRepo<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a level-1 player at `spawn` and enroll them in every mission.
    pub fn create(&self, name: &str, spawn: &SpawnPoint) -> Result<PlayerRecord, RepoError> {
        if self.get_by_name(name)?.is_some() {
            return Err(RepoError::NameTaken(name.to_string()));
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO players (name, level, exp, hp, max_hp, coins, wins, losses, last_map, x, y)
             VALUES (?1, 1, 0, 100, 100, 0, 0, 0, ?2, ?3, ?4)",
            rusqlite::params![name, spawn.map, spawn.x, spawn.y],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT OR IGNORE INTO player_missions (player_id, mission_id)
             SELECT ?1, id FROM missions",
            rusqlite::params![id],
        )?;
        tx.commit()?;

        Ok(PlayerRecord {
            id,
            name: name.to_string(),
            level: 1,
            exp: 0,
            hp: 100,
            max_hp: 100,
            coins: 0,
            wins: 0,
            losses: 0,
            map: spawn.map.clone(),
            x: spawn.x,
            y: spawn.y,
        })
    }

    /// Exact, case-sensitive lookup.
    pub fn get_by_name(&self, name: &str) -> Result<Option<PlayerRecord>, RepoError> {
        let sql = format!("SELECT {PLAYER_COLUMNS} FROM players WHERE name = ?1");
        let record = self
            .conn
            .query_row(&sql, rusqlite::params![name], player_from_row)
            .optional()?;
        Ok(record)
    }

    pub fn get(&self, id: i64) -> Result<Option<PlayerRecord>, RepoError> {
        let sql = format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?1");
        let record = self
            .conn
            .query_row(&sql, rusqlite::params![id], player_from_row)
            .optional()?;
        Ok(record)
    }

    pub fn update_stats(&self, id: i64, patch: &PlayerStatsPatch) -> Result<(), RepoError> {
        apply_stats_patch(self.conn, id, patch)
    }

    pub fn update_position(&self, id: i64, x: f64, y: f64, map: &str) -> Result<(), RepoError> {
        let rows = self.conn.execute(
            "UPDATE players SET x = ?1, y = ?2, last_map = ?3 WHERE id = ?4",
            rusqlite::params![x, y, map, id],
        )?;
        if rows == 0 {
            return Err(RepoError::PlayerNotFound(id));
        }
        Ok(())
    }

    /// Players ordered by experience, highest first.
    pub fn top_by_exp(&self, limit: usize) -> Result<Vec<RankingEntry>, RepoError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, level, exp, wins, losses, coins
             FROM players ORDER BY exp DESC, id ASC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(rusqlite::params![limit as i64], |row| {
                Ok(RankingEntry {
                    name: row.get(0)?,
                    level: row.get(1)?,
                    exp: row.get(2)?,
                    wins: row.get(3)?,
                    losses: row.get(4)?,
                    coins: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

pub(crate) fn apply_stats_patch(
    conn: &Connection,
    id: i64,
    patch: &PlayerStatsPatch,
) -> Result<(), RepoError> {
    if patch.is_empty() {
        return Ok(());
    }
    let rows = conn.execute(
        "UPDATE players SET
            level  = COALESCE(?1, level),
            exp    = COALESCE(?2, exp),
            hp     = COALESCE(?3, hp),
            max_hp = COALESCE(?4, max_hp),
            coins  = COALESCE(?5, coins),
            wins   = COALESCE(?6, wins),
            losses = COALESCE(?7, losses)
         WHERE id = ?8",
        rusqlite::params![
            patch.level,
            patch.exp,
            patch.hp,
            patch.max_hp,
            patch.coins,
            patch.wins,
            patch.losses,
            id
        ],
    )?;
    if rows == 0 {
        return Err(RepoError::PlayerNotFound(id));
    }
    Ok(())
}
