use std::sync::Arc;

use chrono::Utc;
use player_db::{
    AnswerLogEntry, BattlePatch, BattleRecord, BattleState, NewBattle, NpcDefeat, NpcRecord,
    PlayerRecord, PlayerStatsPatch, RepoError, Repository, ResolutionCommit,
};
use rand::Rng;

use crate::error::GameError;
use crate::missions::{MissionTracker, MissionUpdate};
use crate::progression::{grow, max_hp_for_level, BattleConfig};
use crate::question::{validate, Question};

/// One `battle:answer` as received from a player.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerSubmission {
    pub player_id: i64,
    pub npc_id: i64,
    /// `None` opens a fresh battle on the spot.
    pub battle_id: Option<i64>,
    pub answer: String,
    /// Question echoed back by the client. Only consulted when the battle
    /// has no stored question.
    pub echoed: Option<Question>,
}

/// HP of both sides before an answer is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpSnapshot {
    pub player_hp: i32,
    pub npc_hp: i32,
}

/// Pure result of applying one answer to a battle snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub correct: bool,
    /// Battle-side HP after the answer (0 on defeat, new max on level-up).
    pub player_hp: i32,
    pub npc_hp: i32,
    pub player_damage: i32,
    pub enemy_damage: i32,
    pub exp_gain: i64,
    pub coin_gain: i64,
    pub player_defeated: bool,
    pub npc_defeated: bool,
    pub level: u32,
    pub leveled_up: bool,
    /// Durable stat changes, excluding the conditional win credit.
    pub stats: PlayerStatsPatch,
}

/// Apply one answer. Exactly one side takes damage, so both sides cannot
/// reach zero from a live snapshot.
pub fn compute_outcome<R: Rng + ?Sized>(
    config: &BattleConfig,
    player: &PlayerRecord,
    snapshot: HpSnapshot,
    correct: bool,
    rng: &mut R,
) -> Outcome {
    let mut outcome = Outcome {
        correct,
        player_hp: snapshot.player_hp,
        npc_hp: snapshot.npc_hp,
        player_damage: 0,
        enemy_damage: 0,
        exp_gain: 0,
        coin_gain: 0,
        player_defeated: false,
        npc_defeated: false,
        level: player.level,
        leveled_up: false,
        stats: PlayerStatsPatch::default(),
    };

    if correct {
        let damage = config.player_damage(player.level);
        outcome.player_damage = damage;
        outcome.npc_hp = (snapshot.npc_hp - damage).max(0);
        outcome.exp_gain =
            config.base_exp_gain + rng.random_range(0..=config.exp_gain_range.max(0));
        outcome.coin_gain = config.coin_reward;

        let growth = grow(player, player.hp, outcome.exp_gain, outcome.coin_gain);
        outcome.level = growth.level;
        outcome.leveled_up = growth.leveled_up;
        outcome.stats = PlayerStatsPatch {
            exp: Some(growth.exp),
            coins: Some(growth.coins),
            ..Default::default()
        };
        if growth.leveled_up {
            outcome.player_hp = growth.hp;
            outcome.stats.level = Some(growth.level);
            outcome.stats.max_hp = Some(growth.max_hp);
            outcome.stats.hp = Some(growth.hp);
        }
    } else {
        let damage = config.enemy_damage(player.level);
        outcome.enemy_damage = damage;
        outcome.player_hp = (snapshot.player_hp - damage).max(0);
        outcome.stats.hp = Some(outcome.player_hp);
    }

    let player_down = outcome.player_hp <= 0;
    let npc_down = outcome.npc_hp <= 0;
    if player_down && npc_down {
        tracing::error!(
            player_id = player.id,
            "Both sides reached zero HP; reporting player defeat"
        );
        debug_assert!(false, "simultaneous defeat from snapshot {snapshot:?}");
    }

    if player_down {
        outcome.player_defeated = true;
        outcome.stats.losses = Some(player.losses + 1);
        outcome.stats.hp = Some(max_hp_for_level(outcome.level));
    } else if npc_down {
        outcome.npc_defeated = true;
    }
    outcome
}

/// Everything the answering player is told about one resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleResult {
    pub battle_id: i64,
    pub npc_id: i64,
    pub npc_map: String,
    pub correct: bool,
    pub player_hp: i32,
    pub npc_hp: i32,
    pub player_damage: i32,
    pub enemy_damage: i32,
    pub exp_gain: i64,
    pub coin_gain: i64,
    /// True only for the resolution that actually deactivated the NPC.
    pub npc_defeated: bool,
    pub player_defeated: bool,
    pub battle_ended: bool,
    pub level: u32,
    pub leveled_up: bool,
    pub mission_updates: Vec<MissionUpdate>,
}

pub struct BattleEngine {
    repo: Arc<dyn Repository>,
    missions: Arc<MissionTracker>,
    config: BattleConfig,
}

impl BattleEngine {
    pub fn new(
        repo: Arc<dyn Repository>,
        missions: Arc<MissionTracker>,
        config: BattleConfig,
    ) -> Self {
        Self {
            repo,
            missions,
            config,
        }
    }

    /// Persist a new active battle carrying `question`.
    pub async fn open(
        &self,
        player: &PlayerRecord,
        npc: &NpcRecord,
        question: &Question,
    ) -> Result<i64, GameError> {
        let question = serde_json::to_value(question).map_err(RepoError::from)?;
        let battle_id = self
            .repo
            .create_battle(NewBattle {
                player_id: player.id,
                npc_id: npc.id,
                player_hp: player.hp,
                npc_hp: self.config.npc_max_hp,
                question: Some(question),
            })
            .await?;
        tracing::debug!(player_id = player.id, npc_id = npc.id, battle_id, "Battle opened");
        Ok(battle_id)
    }

    /// Resolve one answer. Nothing is reported unless the whole resolution
    /// committed.
    pub async fn resolve(&self, submission: AnswerSubmission) -> Result<BattleResult, GameError> {
        let player = self
            .repo
            .get_player_by_id(submission.player_id)
            .await?
            .ok_or(GameError::PlayerNotFound(submission.player_id))?;
        let npc = self
            .repo
            .get_npc_by_id(submission.npc_id)
            .await?
            .ok_or(GameError::NpcNotFound(submission.npc_id))?;

        if !npc.active {
            return Err(GameError::NpcUnavailable(npc.id));
        }
        let battle = match submission.battle_id {
            Some(battle_id) => self.load_battle(battle_id, &player, &npc).await?,
            None => {
                let question = submission.echoed.clone().ok_or(GameError::MissingQuestion)?;
                let battle_id = self.open(&player, &npc, &question).await?;
                self.load_battle(battle_id, &player, &npc).await?
            }
        };

        let question = stored_question(&battle)
            .or(submission.echoed)
            .ok_or(GameError::MissingQuestion)?;
        let correct = validate(&question, &submission.answer);

        let snapshot = HpSnapshot {
            player_hp: battle.player_hp,
            npc_hp: battle.npc_hp,
        };
        let outcome = {
            let mut rng = rand::rng();
            compute_outcome(&self.config, &player, snapshot, correct, &mut rng)
        };

        let finished = outcome.player_defeated || outcome.npc_defeated;
        let delta_hp = if correct {
            -outcome.player_damage
        } else {
            -outcome.enemy_damage
        };
        let commit = ResolutionCommit {
            player_id: player.id,
            battle_id: battle.id,
            stats: outcome.stats.clone(),
            battle: BattlePatch {
                player_hp: outcome.player_hp,
                npc_hp: outcome.npc_hp,
                state: if finished {
                    BattleState::Finished
                } else {
                    BattleState::Active
                },
            },
            answer: AnswerLogEntry {
                player_id: player.id,
                npc_id: npc.id,
                question: serde_json::to_value(&question).map_err(RepoError::from)?,
                correct,
                delta_hp,
                exp_gain: outcome.exp_gain,
            },
            npc_defeat: outcome.npc_defeated.then(|| NpcDefeat {
                npc_id: npc.id,
                at: Utc::now(),
            }),
        };
        let receipt = self.repo.commit_resolution(commit).await?;

        if outcome.npc_defeated && !receipt.npc_defeated {
            tracing::info!(
                player_id = player.id,
                npc_id = npc.id,
                battle_id = battle.id,
                "NPC already defeated by another player"
            );
        }

        let mission_updates = if correct {
            match self.missions.advance_correct_answers(player.id).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(player_id = player.id, "Mission progress failed: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        tracing::debug!(
            player_id = player.id,
            npc_id = npc.id,
            battle_id = battle.id,
            correct,
            player_hp = outcome.player_hp,
            npc_hp = outcome.npc_hp,
            "Answer resolved"
        );

        Ok(BattleResult {
            battle_id: battle.id,
            npc_id: npc.id,
            npc_map: npc.map.clone(),
            correct,
            player_hp: outcome.player_hp,
            npc_hp: outcome.npc_hp,
            player_damage: outcome.player_damage,
            enemy_damage: outcome.enemy_damage,
            exp_gain: outcome.exp_gain,
            coin_gain: outcome.coin_gain,
            npc_defeated: receipt.npc_defeated,
            player_defeated: outcome.player_defeated,
            battle_ended: finished,
            level: outcome.level,
            leveled_up: outcome.leveled_up,
            mission_updates,
        })
    }

    async fn load_battle(
        &self,
        battle_id: i64,
        player: &PlayerRecord,
        npc: &NpcRecord,
    ) -> Result<BattleRecord, GameError> {
        let battle = self
            .repo
            .get_battle_by_id(battle_id)
            .await?
            .filter(|b| b.player_id == player.id && b.npc_id == npc.id)
            .ok_or(GameError::BattleNotFound(battle_id))?;
        if battle.state == BattleState::Finished {
            return Err(GameError::BattleFinished);
        }
        Ok(battle)
    }
}

fn stored_question(battle: &BattleRecord) -> Option<Question> {
    let value = battle.question.clone()?;
    match serde_json::from_value(value) {
        Ok(question) => Some(question),
        Err(e) => {
            tracing::warn!(battle_id = battle.id, "Unreadable stored question: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::missions::MissionCatalog;
    use crate::test_repo::FaultyRepo;
    use player_db::{PlayerStatsPatch, SqliteRepository};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn player(level: u32, exp: i64, hp: i32) -> PlayerRecord {
        PlayerRecord {
            id: 1,
            name: "Ana".to_string(),
            level,
            exp,
            hp,
            max_hp: max_hp_for_level(level),
            coins: 0,
            wins: 0,
            losses: 2,
            map: "map-city".to_string(),
            x: 400.0,
            y: 300.0,
        }
    }

    fn outcome(p: &PlayerRecord, player_hp: i32, npc_hp: i32, correct: bool) -> Outcome {
        compute_outcome(
            &BattleConfig::default(),
            p,
            HpSnapshot { player_hp, npc_hp },
            correct,
            &mut StdRng::seed_from_u64(1),
        )
    }

    #[test]
    fn fresh_player_correct_answer() {
        let p = player(1, 0, 100);
        let o = outcome(&p, 100, 100, true);
        assert_eq!(o.player_damage, 6);
        assert_eq!(o.npc_hp, 94);
        assert!((10..=15).contains(&o.exp_gain));
        assert_eq!(o.coin_gain, 5);
        assert!(!o.leveled_up);
        assert!(!o.npc_defeated && !o.player_defeated);
        assert_eq!(o.stats.coins, Some(5));
        assert_eq!(o.stats.hp, None);
    }

    #[test]
    fn incorrect_answer_at_low_hp_survives() {
        let p = player(1, 0, 5);
        let o = outcome(&p, 5, 100, false);
        assert_eq!(o.enemy_damage, 4);
        assert_eq!(o.player_hp, 1);
        assert!(!o.player_defeated);
        assert_eq!(o.stats.hp, Some(1));
        assert_eq!(o.stats.losses, None);
    }

    #[test]
    fn incorrect_answer_defeats_player_and_restores_hp() {
        let p = player(1, 0, 3);
        let o = outcome(&p, 3, 100, false);
        assert_eq!(o.player_hp, 0);
        assert!(o.player_defeated);
        assert_eq!(o.stats.losses, Some(3));
        assert_eq!(o.stats.hp, Some(100));
    }

    #[test]
    fn damage_floors_at_zero() {
        let p = player(1, 0, 100);
        let o = outcome(&p, 100, 4, true);
        assert_eq!(o.npc_hp, 0);
        assert!(o.npc_defeated);
    }

    #[test]
    fn exp_gain_stays_in_range() {
        let p = player(1, 0, 100);
        let cfg = BattleConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let snapshot = HpSnapshot {
                player_hp: 100,
                npc_hp: 100,
            };
            let o = compute_outcome(&cfg, &p, snapshot, true, &mut rng);
            assert!((10..=15).contains(&o.exp_gain));
        }
    }

    #[test]
    fn level_up_heals_to_new_max() {
        // 3 exp plus at least 10 crosses the level-2 threshold of 4.
        let p = player(1, 3, 40);
        let o = outcome(&p, 40, 100, true);
        assert!(o.leveled_up);
        assert_eq!(o.level, level_after(3 + o.exp_gain));
        assert_eq!(o.player_hp, max_hp_for_level(o.level));
        assert_eq!(o.stats.hp, Some(max_hp_for_level(o.level)));
    }

    fn level_after(exp: i64) -> u32 {
        crate::progression::level_for_exp(exp)
    }

    struct Fixture {
        repo: Arc<dyn Repository>,
        engine: BattleEngine,
    }

    async fn fixture() -> Fixture {
        let repo: Arc<dyn Repository> = Arc::new(SqliteRepository::open_memory().unwrap());
        let catalog = Arc::new(MissionCatalog::load(repo.as_ref()).await.unwrap());
        let missions = Arc::new(MissionTracker::new(Arc::clone(&repo), catalog));
        let engine = BattleEngine::new(Arc::clone(&repo), missions, BattleConfig::default());
        Fixture { repo, engine }
    }

    fn question(solution: &str) -> Question {
        Question {
            prompt: "q".to_string(),
            solution: solution.to_string(),
            explanation: "e".to_string(),
        }
    }

    async fn start(f: &Fixture, name: &str, solution: &str) -> (PlayerRecord, NpcRecord, i64) {
        let player = f.repo.create_player(name).await.unwrap();
        let npc = f.repo.get_npcs_by_map("map-city").await.unwrap().remove(0);
        let battle_id = f.engine.open(&player, &npc, &question(solution)).await.unwrap();
        (player, npc, battle_id)
    }

    fn submit(player: &PlayerRecord, npc: &NpcRecord, battle_id: i64, answer: &str) -> AnswerSubmission {
        AnswerSubmission {
            player_id: player.id,
            npc_id: npc.id,
            battle_id: Some(battle_id),
            answer: answer.to_string(),
            echoed: None,
        }
    }

    #[tokio::test]
    async fn resolve_persists_correct_answer() {
        let f = fixture().await;
        let (player, npc, battle_id) = start(&f, "Ana", "8").await;

        let result = f.engine.resolve(submit(&player, &npc, battle_id, "8")).await.unwrap();
        assert!(result.correct);
        assert_eq!(result.npc_hp, 94);
        assert!(!result.battle_ended);
        assert_eq!(
            result.mission_updates,
            vec![MissionUpdate::Progress {
                code: "M002".to_string(),
                progress: 1
            }]
        );

        let stored = f.repo.get_player_by_id(player.id).await.unwrap().unwrap();
        assert_eq!(stored.exp, result.exp_gain);
        assert_eq!(stored.coins, 5);
        let battle = f.repo.get_battle_by_id(battle_id).await.unwrap().unwrap();
        assert_eq!(battle.npc_hp, 94);
        assert_eq!(battle.state, BattleState::Active);
    }

    #[tokio::test]
    async fn stored_question_beats_echo() {
        let f = fixture().await;
        let (player, npc, battle_id) = start(&f, "Ana", "8").await;

        let mut sub = submit(&player, &npc, battle_id, "9");
        sub.echoed = Some(question("9"));
        let result = f.engine.resolve(sub).await.unwrap();
        assert!(!result.correct);
        assert_eq!(result.enemy_damage, 4);
        assert_eq!(result.player_hp, 96);
    }

    #[tokio::test]
    async fn answer_without_battle_id_opens_one_from_echo() {
        let f = fixture().await;
        let player = f.repo.create_player("Ana").await.unwrap();
        let npc = f.repo.get_npcs_by_map("map-city").await.unwrap().remove(0);

        let result = f
            .engine
            .resolve(AnswerSubmission {
                player_id: player.id,
                npc_id: npc.id,
                battle_id: None,
                answer: "1.5".to_string(),
                echoed: Some(question("1.50")),
            })
            .await
            .unwrap();
        assert!(result.correct);
        assert!(f.repo.get_battle_by_id(result.battle_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn defeat_finishes_battle_and_rejects_late_answers() {
        let f = fixture().await;
        let (player, npc, battle_id) = start(&f, "Ana", "8").await;
        f.repo
            .update_battle(
                battle_id,
                BattlePatch {
                    player_hp: 3,
                    npc_hp: 100,
                    state: BattleState::Active,
                },
            )
            .await
            .unwrap();

        let result = f.engine.resolve(submit(&player, &npc, battle_id, "0")).await.unwrap();
        assert!(result.player_defeated);
        assert!(result.battle_ended);
        assert_eq!(result.player_hp, 0);

        let stored = f.repo.get_player_by_id(player.id).await.unwrap().unwrap();
        assert_eq!(stored.losses, 1);
        assert_eq!(stored.hp, stored.max_hp);

        let late = f.engine.resolve(submit(&player, &npc, battle_id, "8")).await;
        assert!(matches!(late, Err(GameError::BattleFinished)));
    }

    #[tokio::test]
    async fn npc_defeat_credits_win_and_deactivates() {
        let f = fixture().await;
        let (player, npc, battle_id) = start(&f, "Ana", "8").await;
        f.repo
            .update_battle(
                battle_id,
                BattlePatch {
                    player_hp: 100,
                    npc_hp: 6,
                    state: BattleState::Active,
                },
            )
            .await
            .unwrap();

        let result = f.engine.resolve(submit(&player, &npc, battle_id, "8")).await.unwrap();
        assert!(result.npc_defeated);
        assert!(result.battle_ended);

        let stored = f.repo.get_player_by_id(player.id).await.unwrap().unwrap();
        assert_eq!(stored.wins, 1);
        let npc_after = f.repo.get_npc_by_id(npc.id).await.unwrap().unwrap();
        assert!(!npc_after.active);
        assert!(npc_after.last_defeated_at.is_some());
    }

    #[tokio::test]
    async fn answers_against_inactive_npc_are_unavailable() {
        let f = fixture().await;
        let (player, npc, battle_id) = start(&f, "Ana", "8").await;
        f.repo.deactivate_npc(npc.id, Utc::now()).await.unwrap();

        let result = f.engine.resolve(submit(&player, &npc, battle_id, "8")).await;
        assert!(matches!(result, Err(GameError::NpcUnavailable(_))));
    }

    #[tokio::test]
    async fn inactive_npc_without_battle_id_opens_nothing() {
        let f = fixture().await;
        let player = f.repo.create_player("Ana").await.unwrap();
        let npc = f.repo.get_npcs_by_map("map-city").await.unwrap().remove(0);
        f.repo.deactivate_npc(npc.id, Utc::now()).await.unwrap();

        let result = f
            .engine
            .resolve(AnswerSubmission {
                player_id: player.id,
                npc_id: npc.id,
                battle_id: None,
                answer: "8".to_string(),
                echoed: Some(question("8")),
            })
            .await;
        assert!(matches!(result, Err(GameError::NpcUnavailable(_))));
        assert!(f.repo.get_battle_by_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_trace() {
        let repo = Arc::new(FaultyRepo::new());
        let dyn_repo: Arc<dyn Repository> = repo.clone();
        let catalog = Arc::new(MissionCatalog::load(dyn_repo.as_ref()).await.unwrap());
        let missions = Arc::new(MissionTracker::new(Arc::clone(&dyn_repo), catalog));
        let engine = BattleEngine::new(Arc::clone(&dyn_repo), missions, BattleConfig::default());

        let player = dyn_repo.create_player("Ana").await.unwrap();
        let npc = dyn_repo.get_npcs_by_map("map-city").await.unwrap().remove(0);
        let battle_id = engine.open(&player, &npc, &question("8")).await.unwrap();

        FaultyRepo::set(&repo.faults.commit, true);
        let result = engine.resolve(submit(&player, &npc, battle_id, "8")).await;
        assert!(matches!(&result, Err(e) if e.kind() == ErrorKind::Storage));

        let stored = dyn_repo.get_player_by_id(player.id).await.unwrap().unwrap();
        assert_eq!((stored.exp, stored.coins), (0, 0));
        let missions = dyn_repo.get_player_missions(player.id).await.unwrap();
        assert!(missions.iter().all(|m| m.progress == 0));
        let battle = dyn_repo.get_battle_by_id(battle_id).await.unwrap().unwrap();
        assert_eq!(battle.npc_hp, 100);
    }

    #[tokio::test]
    async fn foreign_battle_is_not_found() {
        let f = fixture().await;
        let (_, npc, battle_id) = start(&f, "Ana", "8").await;
        let intruder = f.repo.create_player("Bia").await.unwrap();

        let result = f.engine.resolve(submit(&intruder, &npc, battle_id, "8")).await;
        assert!(matches!(result, Err(GameError::BattleNotFound(id)) if id == battle_id));

        let missing = f.engine.resolve(submit(&intruder, &npc, 9999, "8")).await;
        assert!(matches!(missing, Err(GameError::BattleNotFound(9999))));
    }

    #[tokio::test]
    async fn unknown_player_or_npc_is_hard_failure() {
        let f = fixture().await;
        let (player, npc, battle_id) = start(&f, "Ana", "8").await;

        let mut sub = submit(&player, &npc, battle_id, "8");
        sub.player_id = 777;
        assert!(matches!(
            f.engine.resolve(sub).await,
            Err(GameError::PlayerNotFound(777))
        ));

        let mut sub = submit(&player, &npc, battle_id, "8");
        sub.npc_id = 888;
        assert!(matches!(
            f.engine.resolve(sub).await,
            Err(GameError::NpcNotFound(888))
        ));
    }

    #[tokio::test]
    async fn mission_reward_applies_on_fifth_correct_answer() {
        let f = fixture().await;
        let (player, npc, _) = start(&f, "Ana", "8").await;
        f.repo
            .update_player_stats(
                player.id,
                PlayerStatsPatch {
                    hp: Some(100),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut total_exp = 0;
        let mut completed = false;
        for _ in 0..5 {
            let battle_id = f.engine.open(&player, &npc, &question("8")).await.unwrap();
            let result = f.engine.resolve(submit(&player, &npc, battle_id, "8")).await.unwrap();
            total_exp += result.exp_gain;
            completed |= result.mission_updates.iter().any(|u| u.is_completion());
        }
        assert!(completed);

        let stored = f.repo.get_player_by_id(player.id).await.unwrap().unwrap();
        assert_eq!(stored.exp, total_exp + 50);
        assert_eq!(stored.coins, 5 * 5 + 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_defeat_credits_exactly_one_win() {
        let f = Arc::new(fixture().await);
        let npc = f.repo.get_npcs_by_map("map-city").await.unwrap().remove(0);

        let mut submissions = Vec::new();
        for name in ["Ana", "Bia"] {
            let player = f.repo.create_player(name).await.unwrap();
            let battle_id = f.engine.open(&player, &npc, &question("8")).await.unwrap();
            f.repo
                .update_battle(
                    battle_id,
                    BattlePatch {
                        player_hp: 100,
                        npc_hp: 6,
                        state: BattleState::Active,
                    },
                )
                .await
                .unwrap();
            submissions.push(submit(&player, &npc, battle_id, "8"));
        }

        let handles: Vec<_> = submissions
            .into_iter()
            .map(|sub| {
                let f = Arc::clone(&f);
                tokio::spawn(async move { f.engine.resolve(sub).await })
            })
            .collect();

        let mut defeats = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(result) => {
                    assert!(result.battle_ended);
                    if result.npc_defeated {
                        defeats += 1;
                    }
                }
                Err(GameError::NpcUnavailable(id)) => assert_eq!(id, npc.id),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(defeats, 1);

        let ranking = f.repo.top_players(10).await.unwrap();
        let wins: i64 = ranking.iter().map(|r| r.wins).sum();
        assert_eq!(wins, 1);
    }
}
