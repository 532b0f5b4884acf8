//! In-memory repository whose storage calls can be switched to fail.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use player_db::{
    AnswerLogEntry, BattlePatch, BattleRecord, CommitReceipt, MissionDefinition, NewBattle,
    NpcRecord, PlayerMission, PlayerRecord, PlayerStatsPatch, RankingEntry, RepoError,
    Repository, ResolutionCommit, SqliteRepository,
};

#[derive(Default)]
pub(crate) struct Faults {
    pub commit: AtomicBool,
    pub respawn_lookup: AtomicBool,
    pub reactivate: AtomicBool,
}

pub(crate) struct FaultyRepo {
    inner: SqliteRepository,
    pub faults: Faults,
}

impl FaultyRepo {
    pub fn new() -> Self {
        Self {
            inner: SqliteRepository::open_memory().unwrap(),
            faults: Faults::default(),
        }
    }

    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), RepoError> {
        if flag.load(Ordering::SeqCst) {
            let broken = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
            return Err(RepoError::Encoding(broken));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for FaultyRepo {
    async fn get_player_by_name(&self, name: &str) -> Result<Option<PlayerRecord>, RepoError> {
        self.inner.get_player_by_name(name).await
    }

    async fn get_player_by_id(&self, id: i64) -> Result<Option<PlayerRecord>, RepoError> {
        self.inner.get_player_by_id(id).await
    }

    async fn create_player(&self, name: &str) -> Result<PlayerRecord, RepoError> {
        self.inner.create_player(name).await
    }

    async fn update_player_stats(
        &self,
        id: i64,
        patch: PlayerStatsPatch,
    ) -> Result<(), RepoError> {
        self.inner.update_player_stats(id, patch).await
    }

    async fn update_player_position(
        &self,
        id: i64,
        x: f64,
        y: f64,
        map: &str,
    ) -> Result<(), RepoError> {
        self.inner.update_player_position(id, x, y, map).await
    }

    async fn get_npcs_by_map(&self, map: &str) -> Result<Vec<NpcRecord>, RepoError> {
        self.inner.get_npcs_by_map(map).await
    }

    async fn get_npc_by_id(&self, id: i64) -> Result<Option<NpcRecord>, RepoError> {
        self.inner.get_npc_by_id(id).await
    }

    async fn deactivate_npc(&self, id: i64, at: DateTime<Utc>) -> Result<bool, RepoError> {
        self.inner.deactivate_npc(id, at).await
    }

    async fn find_respawnable_npcs(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<NpcRecord>, RepoError> {
        Self::check(&self.faults.respawn_lookup)?;
        self.inner.find_respawnable_npcs(now).await
    }

    async fn reactivate_npc(&self, id: i64) -> Result<bool, RepoError> {
        Self::check(&self.faults.reactivate)?;
        self.inner.reactivate_npc(id).await
    }

    async fn create_battle(&self, battle: NewBattle) -> Result<i64, RepoError> {
        self.inner.create_battle(battle).await
    }

    async fn get_battle_by_id(&self, id: i64) -> Result<Option<BattleRecord>, RepoError> {
        self.inner.get_battle_by_id(id).await
    }

    async fn update_battle(&self, id: i64, patch: BattlePatch) -> Result<(), RepoError> {
        self.inner.update_battle(id, patch).await
    }

    async fn append_answer_log(&self, entry: AnswerLogEntry) -> Result<(), RepoError> {
        self.inner.append_answer_log(entry).await
    }

    async fn commit_resolution(
        &self,
        commit: ResolutionCommit,
    ) -> Result<CommitReceipt, RepoError> {
        Self::check(&self.faults.commit)?;
        self.inner.commit_resolution(commit).await
    }

    async fn mission_definitions(&self) -> Result<Vec<MissionDefinition>, RepoError> {
        self.inner.mission_definitions().await
    }

    async fn get_player_missions(&self, player_id: i64) -> Result<Vec<PlayerMission>, RepoError> {
        self.inner.get_player_missions(player_id).await
    }

    async fn update_mission_progress(
        &self,
        player_id: i64,
        code: &str,
        progress: i64,
    ) -> Result<(), RepoError> {
        self.inner
            .update_mission_progress(player_id, code, progress)
            .await
    }

    async fn complete_mission(&self, player_id: i64, code: &str) -> Result<bool, RepoError> {
        self.inner.complete_mission(player_id, code).await
    }

    async fn top_players(&self, limit: usize) -> Result<Vec<RankingEntry>, RepoError> {
        self.inner.top_players(limit).await
    }
}
