use rusqlite::{Connection, OptionalExtension};

use crate::error::RepoError;
use crate::records::{AnswerLogEntry, BattlePatch, BattleRecord, NewBattle};

/// Repository for battles and the answer log.
pub struct BattleRepo<'a> {
    conn: &'a Connection,
}

impl<'a> BattleRepo<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn create(&self, battle: &NewBattle) -> Result<i64, RepoError> {
        let question_json = battle
            .question
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            "INSERT INTO battles (player_id, npc_id, player_hp, npc_hp, state, question_json)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5)",
            rusqlite::params![
                battle.player_id,
                battle.npc_id,
                battle.player_hp,
                battle.npc_hp,
                question_json
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get(&self, id: i64) -> Result<Option<BattleRecord>, RepoError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, player_id, npc_id, player_hp, npc_hp, state, question_json
                 FROM battles WHERE id = ?1",
                rusqlite::params![id],
                |row| {
                    let question_json: Option<String> = row.get(6)?;
                    Ok((
                        BattleRecord {
                            id: row.get(0)?,
                            player_id: row.get(1)?,
                            npc_id: row.get(2)?,
                            player_hp: row.get(3)?,
                            npc_hp: row.get(4)?,
                            state: row.get(5)?,
                            question: None,
                        },
                        question_json,
                    ))
                },
            )
            .optional()?;

        let Some((mut battle, question_json)) = row else {
            return Ok(None);
        };
        if let Some(json) = question_json {
            battle.question = Some(serde_json::from_str(&json)?);
        }
        Ok(Some(battle))
    }

    pub fn update(&self, id: i64, patch: &BattlePatch) -> Result<(), RepoError> {
        apply_battle_patch(self.conn, id, patch)
    }

    pub fn log_answer(&self, entry: &AnswerLogEntry) -> Result<(), RepoError> {
        append_answer(self.conn, entry)
    }
}

pub(crate) fn apply_battle_patch(
    conn: &Connection,
    id: i64,
    patch: &BattlePatch,
) -> Result<(), RepoError> {
    let rows = conn.execute(
        "UPDATE battles SET player_hp = ?1, npc_hp = ?2, state = ?3 WHERE id = ?4",
        rusqlite::params![patch.player_hp, patch.npc_hp, patch.state.as_str(), id],
    )?;
    if rows == 0 {
        return Err(RepoError::BattleNotFound(id));
    }
    Ok(())
}

pub(crate) fn append_answer(conn: &Connection, entry: &AnswerLogEntry) -> Result<(), RepoError> {
    let snapshot = serde_json::to_string(&entry.question)?;
    conn.execute(
        "INSERT INTO answers_log (player_id, npc_id, question_snapshot_json, correct, delta_hp, exp_gain)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            entry.player_id,
            entry.npc_id,
            snapshot,
            entry.correct,
            entry.delta_hp,
            entry.exp_gain
        ],
    )?;
    Ok(())
}
