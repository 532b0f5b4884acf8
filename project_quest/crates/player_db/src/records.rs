use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use serde::Serialize;

/// Text-backed enum columns.
macro_rules! text_column {
    ($ty:ty, $what:literal) => {
        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::parse(s)
                    .ok_or_else(|| FromSqlError::Other(format!("unknown {} '{}'", $what, s).into()))
            }
        }
    };
}

text_column!(BattleState, "battle state");
text_column!(MissionTrigger, "mission type");
text_column!(MissionStatus, "mission status");

/// Where new players start.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPoint {
    pub map: String,
    pub x: f64,
    pub y: f64,
}

impl Default for SpawnPoint {
    fn default() -> Self {
        Self {
            map: "map-city".to_string(),
            x: 400.0,
            y: 300.0,
        }
    }
}

/// A durable player record.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: i64,
    pub name: String,
    pub level: u32,
    pub exp: i64,
    pub hp: i32,
    pub max_hp: i32,
    pub coins: i64,
    pub wins: i64,
    pub losses: i64,
    pub map: String,
    pub x: f64,
    pub y: f64,
}

/// Partial update of a player's stats. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStatsPatch {
    pub level: Option<u32>,
    pub exp: Option<i64>,
    pub hp: Option<i32>,
    pub max_hp: Option<i32>,
    pub coins: Option<i64>,
    pub wins: Option<i64>,
    pub losses: Option<i64>,
}

impl PlayerStatsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NpcRecord {
    pub id: i64,
    pub name: String,
    pub map: String,
    pub x: f64,
    pub y: f64,
    pub active: bool,
    pub last_defeated_at: Option<DateTime<Utc>>,
    pub respawn_seconds: i64,
}

impl NpcRecord {
    /// Instant at which a defeated NPC becomes eligible for respawn.
    pub fn respawn_due_at(&self) -> Option<DateTime<Utc>> {
        if self.active {
            return None;
        }
        self.last_defeated_at
            .map(|at| at + chrono::Duration::seconds(self.respawn_seconds))
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleState {
    Active,
    Finished,
}

impl BattleState {
    pub fn as_str(self) -> &'static str {
        match self {
            BattleState::Active => "active",
            BattleState::Finished => "finished",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(BattleState::Active),
            "finished" => Some(BattleState::Finished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BattleRecord {
    pub id: i64,
    pub player_id: i64,
    pub npc_id: i64,
    pub player_hp: i32,
    pub npc_hp: i32,
    pub state: BattleState,
    /// Question issued when the battle opened, as stored JSON.
    pub question: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBattle {
    pub player_id: i64,
    pub npc_id: i64,
    pub player_hp: i32,
    pub npc_hp: i32,
    pub question: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BattlePatch {
    pub player_hp: i32,
    pub npc_hp: i32,
    pub state: BattleState,
}

/// Append-only record of one submitted answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerLogEntry {
    pub player_id: i64,
    pub npc_id: i64,
    pub question: serde_json::Value,
    pub correct: bool,
    pub delta_hp: i32,
    pub exp_gain: i64,
}

/// Mark an NPC defeated at `at`, but only if it is still active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NpcDefeat {
    pub npc_id: i64,
    pub at: DateTime<Utc>,
}

/// Everything one battle resolution writes, committed atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionCommit {
    pub player_id: i64,
    pub battle_id: i64,
    pub stats: PlayerStatsPatch,
    pub battle: BattlePatch,
    pub answer: AnswerLogEntry,
    /// When set, the player is credited a win only if this defeat applies.
    pub npc_defeat: Option<NpcDefeat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitReceipt {
    /// True when this commit was the one that deactivated the NPC.
    pub npc_defeated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissionTrigger {
    TalkNpc,
    CorrectAnswers,
    EnterPortal,
}

impl MissionTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            MissionTrigger::TalkNpc => "talk_npc",
            MissionTrigger::CorrectAnswers => "correct_answers",
            MissionTrigger::EnterPortal => "enter_portal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "talk_npc" => Some(MissionTrigger::TalkNpc),
            "correct_answers" => Some(MissionTrigger::CorrectAnswers),
            "enter_portal" => Some(MissionTrigger::EnterPortal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionStatus {
    Active,
    Completed,
}

impl MissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MissionStatus::Active => "active",
            MissionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(MissionStatus::Active),
            "completed" => Some(MissionStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissionDefinition {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub description: String,
    pub trigger: MissionTrigger,
    pub target: i64,
    pub reward_exp: i64,
    pub reward_coins: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMission {
    pub definition: MissionDefinition,
    pub progress: i64,
    pub status: MissionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub name: String,
    pub level: u32,
    pub exp: i64,
    pub wins: i64,
    pub losses: i64,
    pub coins: i64,
}
