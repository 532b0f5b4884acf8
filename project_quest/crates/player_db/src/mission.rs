use rusqlite::{Connection, Row};

use crate::error::RepoError;
use crate::records::{MissionDefinition, PlayerMission};

fn definition_from_row(row: &Row<'_>) -> rusqlite::Result<MissionDefinition> {
    Ok(MissionDefinition {
        id: row.get(0)?,
        code: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        trigger: row.get(4)?,
        target: row.get(5)?,
        reward_exp: row.get(6)?,
        reward_coins: row.get(7)?,
    })
}

/// Repository for mission definitions and per-player progress.
pub struct MissionRepo<'a> {
    conn: &'a Connection,
}

impl<'a> MissionRepo<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn definitions(&self) -> Result<Vec<MissionDefinition>, RepoError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, code, title, description, type, target, reward_exp, reward_coins
             FROM missions ORDER BY id",
        )?;
        let definitions = stmt
            .query_map([], definition_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(definitions)
    }

    pub fn for_player(&self, player_id: i64) -> Result<Vec<PlayerMission>, RepoError> {
        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.code, m.title, m.description, m.type, m.target, m.reward_exp, m.reward_coins,
                    pm.progress, pm.status
             FROM missions m JOIN player_missions pm ON m.id = pm.mission_id
             WHERE pm.player_id = ?1 ORDER BY m.id",
        )?;
        let missions = stmt
            .query_map(rusqlite::params![player_id], |row| {
                Ok(PlayerMission {
                    definition: definition_from_row(row)?,
                    progress: row.get(8)?,
                    status: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(missions)
    }

    /// Raise progress. Progress never decreases and completed missions are frozen.
    pub fn update_progress(
        &self,
        player_id: i64,
        code: &str,
        progress: i64,
    ) -> Result<(), RepoError> {
        let mission_id = self.mission_id(code)?;
        self.conn.execute(
            "UPDATE player_missions
             SET progress = MAX(progress, ?1), updated_at = datetime('now')
             WHERE player_id = ?2 AND mission_id = ?3 AND status = 'active'",
            rusqlite::params![progress, player_id, mission_id],
        )?;
        Ok(())
    }

    /// Check-then-set `active -> completed`. True only for the transition itself.
    pub fn complete(&self, player_id: i64, code: &str) -> Result<bool, RepoError> {
        let mission_id = self.mission_id(code)?;
        let rows = self.conn.execute(
            "UPDATE player_missions
             SET status = 'completed', updated_at = datetime('now')
             WHERE player_id = ?1 AND mission_id = ?2 AND status = 'active'",
            rusqlite::params![player_id, mission_id],
        )?;
        Ok(rows == 1)
    }

    fn mission_id(&self, code: &str) -> Result<i64, RepoError> {
        self.conn
            .query_row(
                "SELECT id FROM missions WHERE code = ?1",
                rusqlite::params![code],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => RepoError::MissionNotFound(code.to_string()),
                other => other.into(),
            })
    }
}
