use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::PlayerDb;
use crate::error::RepoError;
use crate::records::{
    AnswerLogEntry, BattlePatch, BattleRecord, CommitReceipt, MissionDefinition, NewBattle,
    NpcRecord, PlayerMission, PlayerRecord, PlayerStatsPatch, RankingEntry, ResolutionCommit,
    SpawnPoint,
};
use crate::repository::Repository;

/// [`Repository`] over a single SQLite connection. Calls are serialized on
/// the connection and run on the blocking pool.
#[derive(Clone)]
pub struct SqliteRepository {
    db: Arc<Mutex<PlayerDb>>,
    spawn: SpawnPoint,
}

impl SqliteRepository {
    pub fn open(path: &str) -> Result<Self, RepoError> {
        Ok(Self::new(PlayerDb::open(path)?))
    }

    pub fn open_memory() -> Result<Self, RepoError> {
        Ok(Self::new(PlayerDb::open_memory()?))
    }

    pub fn new(db: PlayerDb) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            spawn: SpawnPoint::default(),
        }
    }

    pub fn with_spawn(mut self, spawn: SpawnPoint) -> Self {
        self.spawn = spawn;
        self
    }

    async fn run<T, F>(&self, f: F) -> Result<T, RepoError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PlayerDb) -> Result<T, RepoError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut guard = db.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        })
        .await?
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn get_player_by_name(&self, name: &str) -> Result<Option<PlayerRecord>, RepoError> {
        let name = name.to_string();
        self.run(move |db| db.player().get_by_name(&name)).await
    }

    async fn get_player_by_id(&self, id: i64) -> Result<Option<PlayerRecord>, RepoError> {
        self.run(move |db| db.player().get(id)).await
    }

    async fn create_player(&self, name: &str) -> Result<PlayerRecord, RepoError> {
        let name = name.to_string();
        let spawn = self.spawn.clone();
        let record = self.run(move |db| db.player().create(&name, &spawn)).await?;
        tracing::info!(player_id = record.id, name = %record.name, "Player created");
        Ok(record)
    }

    async fn update_player_stats(
        &self,
        id: i64,
        patch: PlayerStatsPatch,
    ) -> Result<(), RepoError> {
        self.run(move |db| db.player().update_stats(id, &patch)).await
    }

    async fn update_player_position(
        &self,
        id: i64,
        x: f64,
        y: f64,
        map: &str,
    ) -> Result<(), RepoError> {
        let map = map.to_string();
        self.run(move |db| db.player().update_position(id, x, y, &map))
            .await
    }

    async fn get_npcs_by_map(&self, map: &str) -> Result<Vec<NpcRecord>, RepoError> {
        let map = map.to_string();
        self.run(move |db| db.npc().list_by_map(&map)).await
    }

    async fn get_npc_by_id(&self, id: i64) -> Result<Option<NpcRecord>, RepoError> {
        self.run(move |db| db.npc().get(id)).await
    }

    async fn deactivate_npc(&self, id: i64, at: DateTime<Utc>) -> Result<bool, RepoError> {
        self.run(move |db| db.npc().deactivate(id, at)).await
    }

    async fn find_respawnable_npcs(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<NpcRecord>, RepoError> {
        self.run(move |db| db.npc().find_respawnable(now)).await
    }

    async fn reactivate_npc(&self, id: i64) -> Result<bool, RepoError> {
        self.run(move |db| db.npc().reactivate(id)).await
    }

    async fn create_battle(&self, battle: NewBattle) -> Result<i64, RepoError> {
        self.run(move |db| db.battle().create(&battle)).await
    }

    async fn get_battle_by_id(&self, id: i64) -> Result<Option<BattleRecord>, RepoError> {
        self.run(move |db| db.battle().get(id)).await
    }

    async fn update_battle(&self, id: i64, patch: BattlePatch) -> Result<(), RepoError> {
        self.run(move |db| db.battle().update(id, &patch)).await
    }

    async fn append_answer_log(&self, entry: AnswerLogEntry) -> Result<(), RepoError> {
        self.run(move |db| db.battle().log_answer(&entry)).await
    }

    async fn commit_resolution(
        &self,
        commit: ResolutionCommit,
    ) -> Result<CommitReceipt, RepoError> {
        self.run(move |db| db.commit_resolution(&commit)).await
    }

    async fn mission_definitions(&self) -> Result<Vec<MissionDefinition>, RepoError> {
        self.run(|db| db.mission().definitions()).await
    }

    async fn get_player_missions(&self, player_id: i64) -> Result<Vec<PlayerMission>, RepoError> {
        self.run(move |db| db.mission().for_player(player_id)).await
    }

    async fn update_mission_progress(
        &self,
        player_id: i64,
        code: &str,
        progress: i64,
    ) -> Result<(), RepoError> {
        let code = code.to_string();
        self.run(move |db| db.mission().update_progress(player_id, &code, progress))
            .await
    }

    async fn complete_mission(&self, player_id: i64, code: &str) -> Result<bool, RepoError> {
        let code = code.to_string();
        self.run(move |db| db.mission().complete(player_id, &code))
            .await
    }

    async fn top_players(&self, limit: usize) -> Result<Vec<RankingEntry>, RepoError> {
        self.run(move |db| db.player().top_by_exp(limit)).await
    }
}
