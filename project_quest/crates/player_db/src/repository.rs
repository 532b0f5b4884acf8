use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RepoError;
use crate::records::{
    AnswerLogEntry, BattlePatch, BattleRecord, CommitReceipt, MissionDefinition, NewBattle,
    NpcRecord, PlayerMission, PlayerRecord, PlayerStatsPatch, RankingEntry, ResolutionCommit,
};

/// Durable storage used by the game components. Every call may fail
/// independently; none of them retries.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_player_by_name(&self, name: &str) -> Result<Option<PlayerRecord>, RepoError>;
    async fn get_player_by_id(&self, id: i64) -> Result<Option<PlayerRecord>, RepoError>;
    /// Creates the player at the spawn point and provisions every mission.
    async fn create_player(&self, name: &str) -> Result<PlayerRecord, RepoError>;
    async fn update_player_stats(&self, id: i64, patch: PlayerStatsPatch)
        -> Result<(), RepoError>;
    async fn update_player_position(
        &self,
        id: i64,
        x: f64,
        y: f64,
        map: &str,
    ) -> Result<(), RepoError>;

    async fn get_npcs_by_map(&self, map: &str) -> Result<Vec<NpcRecord>, RepoError>;
    async fn get_npc_by_id(&self, id: i64) -> Result<Option<NpcRecord>, RepoError>;
    async fn deactivate_npc(&self, id: i64, at: DateTime<Utc>) -> Result<bool, RepoError>;
    async fn find_respawnable_npcs(&self, now: DateTime<Utc>)
        -> Result<Vec<NpcRecord>, RepoError>;
    async fn reactivate_npc(&self, id: i64) -> Result<bool, RepoError>;

    async fn create_battle(&self, battle: NewBattle) -> Result<i64, RepoError>;
    async fn get_battle_by_id(&self, id: i64) -> Result<Option<BattleRecord>, RepoError>;
    async fn update_battle(&self, id: i64, patch: BattlePatch) -> Result<(), RepoError>;
    async fn append_answer_log(&self, entry: AnswerLogEntry) -> Result<(), RepoError>;
    async fn commit_resolution(
        &self,
        commit: ResolutionCommit,
    ) -> Result<CommitReceipt, RepoError>;

    async fn mission_definitions(&self) -> Result<Vec<MissionDefinition>, RepoError>;
    async fn get_player_missions(&self, player_id: i64) -> Result<Vec<PlayerMission>, RepoError>;
    async fn update_mission_progress(
        &self,
        player_id: i64,
        code: &str,
        progress: i64,
    ) -> Result<(), RepoError>;
    async fn complete_mission(&self, player_id: i64, code: &str) -> Result<bool, RepoError>;

    async fn top_players(&self, limit: usize) -> Result<Vec<RankingEntry>, RepoError>;
}
