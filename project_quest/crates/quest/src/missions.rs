use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use player_db::{
    MissionDefinition, MissionStatus, MissionTrigger, PlayerMission, Repository,
};

use crate::error::GameError;
use crate::progression::grow;

/// The missions the game logic knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MissionId {
    /// Talk to any NPC.
    FirstContact,
    /// Answer questions correctly.
    SharpMind,
    /// Enter the forest portal.
    Explorer,
}

impl MissionId {
    pub const ALL: [MissionId; 3] = [
        MissionId::FirstContact,
        MissionId::SharpMind,
        MissionId::Explorer,
    ];

    pub fn code(self) -> &'static str {
        match self {
            MissionId::FirstContact => "M001",
            MissionId::SharpMind => "M002",
            MissionId::Explorer => "M003",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.code() == code)
    }
}

/// Mission definitions, resolved once at startup and indexed by trigger.
#[derive(Debug, Clone, Default)]
pub struct MissionCatalog {
    definitions: BTreeMap<MissionId, MissionDefinition>,
    by_trigger: HashMap<MissionTrigger, Vec<MissionId>>,
}

impl MissionCatalog {
    pub fn new(rows: Vec<MissionDefinition>) -> Self {
        let mut definitions = BTreeMap::new();
        for def in rows {
            match MissionId::from_code(&def.code) {
                Some(id) => {
                    definitions.insert(id, def);
                }
                None => tracing::warn!(code = %def.code, "Unknown mission in catalog, ignored"),
            }
        }
        for id in MissionId::ALL {
            if !definitions.contains_key(&id) {
                tracing::warn!(code = id.code(), "Mission missing from catalog");
            }
        }

        let mut by_trigger: HashMap<MissionTrigger, Vec<MissionId>> = HashMap::new();
        for (id, def) in &definitions {
            by_trigger.entry(def.trigger).or_default().push(*id);
        }
        Self {
            definitions,
            by_trigger,
        }
    }

    pub async fn load(repo: &dyn Repository) -> Result<Self, GameError> {
        let catalog = Self::new(repo.mission_definitions().await?);
        tracing::info!(missions = catalog.len(), "Mission catalog loaded");
        Ok(catalog)
    }

    pub fn get(&self, id: MissionId) -> Option<&MissionDefinition> {
        self.definitions.get(&id)
    }

    /// Missions advanced by `trigger`.
    pub fn triggered_by(&self, trigger: MissionTrigger) -> &[MissionId] {
        self.by_trigger
            .get(&trigger)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// A gameplay event that may move missions forward.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerPayload {
    TalkNpc { npc_id: i64 },
    EnterPortal { portal_entered: bool },
    CorrectAnswer,
}

impl TriggerPayload {
    pub fn trigger(&self) -> MissionTrigger {
        match self {
            TriggerPayload::TalkNpc { .. } => MissionTrigger::TalkNpc,
            TriggerPayload::EnterPortal { .. } => MissionTrigger::EnterPortal,
            TriggerPayload::CorrectAnswer => MissionTrigger::CorrectAnswers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissionUpdate {
    Progress {
        code: String,
        progress: i64,
    },
    Completed {
        code: String,
        reward_exp: i64,
        reward_coins: i64,
        /// Level after the reward was applied.
        level: u32,
    },
}

impl MissionUpdate {
    pub fn is_completion(&self) -> bool {
        matches!(self, MissionUpdate::Completed { .. })
    }
}

pub struct MissionTracker {
    repo: Arc<dyn Repository>,
    catalog: Arc<MissionCatalog>,
}

impl MissionTracker {
    pub fn new(repo: Arc<dyn Repository>, catalog: Arc<MissionCatalog>) -> Self {
        Self { repo, catalog }
    }

    pub fn catalog(&self) -> &MissionCatalog {
        &self.catalog
    }

    pub async fn snapshot(&self, player_id: i64) -> Result<Vec<PlayerMission>, GameError> {
        Ok(self.repo.get_player_missions(player_id).await?)
    }

    /// Apply a trigger to every active mission it matches.
    ///
    /// `correct_answers` missions are not moved here; the battle engine
    /// advances them through [`MissionTracker::advance_correct_answers`].
    pub async fn dispatch(
        &self,
        player_id: i64,
        payload: &TriggerPayload,
    ) -> Result<Vec<MissionUpdate>, GameError> {
        let step = match payload {
            TriggerPayload::TalkNpc { .. } => Step::Increment,
            TriggerPayload::EnterPortal {
                portal_entered: true,
            } => Step::Complete,
            TriggerPayload::EnterPortal {
                portal_entered: false,
            }
            | TriggerPayload::CorrectAnswer => return Ok(Vec::new()),
        };
        self.apply(player_id, payload.trigger(), step).await
    }

    /// Count one correct answer towards every active `correct_answers` mission.
    pub async fn advance_correct_answers(
        &self,
        player_id: i64,
    ) -> Result<Vec<MissionUpdate>, GameError> {
        self.apply(player_id, MissionTrigger::CorrectAnswers, Step::Increment)
            .await
    }

    async fn apply(
        &self,
        player_id: i64,
        trigger: MissionTrigger,
        step: Step,
    ) -> Result<Vec<MissionUpdate>, GameError> {
        let wanted = self.catalog.triggered_by(trigger);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let progress = self.repo.get_player_missions(player_id).await?;
        let mut updates = Vec::new();

        for mission in progress.iter().filter(|m| m.status == MissionStatus::Active) {
            let Some(def) = MissionId::from_code(&mission.definition.code)
                .filter(|id| wanted.contains(id))
                .and_then(|id| self.catalog.get(id))
            else {
                continue;
            };

            let reached = match step {
                Step::Increment => {
                    let next = mission.progress + 1;
                    self.repo
                        .update_mission_progress(player_id, &def.code, next)
                        .await?;
                    if next < def.target {
                        updates.push(MissionUpdate::Progress {
                            code: def.code.clone(),
                            progress: next,
                        });
                        false
                    } else {
                        true
                    }
                }
                Step::Complete => {
                    self.repo
                        .update_mission_progress(player_id, &def.code, def.target)
                        .await?;
                    true
                }
            };

            if reached {
                if let Some(done) = self.complete(player_id, def).await? {
                    updates.push(done);
                }
            }
        }
        Ok(updates)
    }

    /// `active -> completed` plus the reward, exactly once.
    async fn complete(
        &self,
        player_id: i64,
        def: &MissionDefinition,
    ) -> Result<Option<MissionUpdate>, GameError> {
        if !self.repo.complete_mission(player_id, &def.code).await? {
            return Ok(None);
        }

        let player = self
            .repo
            .get_player_by_id(player_id)
            .await?
            .ok_or(GameError::PlayerNotFound(player_id))?;
        let growth = grow(&player, player.hp, def.reward_exp, def.reward_coins);
        self.repo
            .update_player_stats(player_id, growth.to_patch())
            .await?;

        tracing::info!(
            player_id,
            mission = %def.code,
            reward_exp = def.reward_exp,
            reward_coins = def.reward_coins,
            "Mission completed"
        );
        Ok(Some(MissionUpdate::Completed {
            code: def.code.clone(),
            reward_exp: def.reward_exp,
            reward_coins: def.reward_coins,
            level: growth.level,
        }))
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Increment,
    Complete,
}
