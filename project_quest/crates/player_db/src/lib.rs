pub mod battle;
pub mod db;
pub mod error;
pub mod mission;
pub mod npc;
pub mod player;
pub mod records;
pub mod repository;
mod schema;
pub mod sqlite;

pub use db::PlayerDb;
pub use error::RepoError;
pub use records::{
    AnswerLogEntry, BattlePatch, BattleRecord, BattleState, CommitReceipt, MissionDefinition,
    MissionStatus, MissionTrigger, NewBattle, NpcDefeat, NpcRecord, PlayerMission, PlayerRecord,
    PlayerStatsPatch, RankingEntry, ResolutionCommit, SpawnPoint,
};
pub use repository::Repository;
pub use sqlite::SqliteRepository;
