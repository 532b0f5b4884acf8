use std::sync::Arc;

use async_trait::async_trait;
use net::channels::SessionWriteTx;
use net::protocol::{
    AnswerRequest, ClientMessage, InteractRequest, JoinRequest, MissionEventRequest, MoveRequest,
    ServerMessage,
};
use net::web_server::SessionHandler;
use player_db::{PlayerRecord, RepoError, Repository};
use session::{LivePlayer, RegistryError, SessionId, SessionRegistry, SessionState};

use crate::battle::{AnswerSubmission, BattleEngine};
use crate::error::{ErrorKind, GameError};
use crate::missions::{MissionTracker, MissionUpdate, TriggerPayload};
use crate::movement::PositionWriter;
use crate::question::{generate, Difficulty, Question};
use crate::wire;

/// World rules the coordinator enforces on live sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldRules {
    pub interaction_radius: f64,
    pub min_name_len: usize,
}

impl Default for WorldRules {
    fn default() -> Self {
        Self {
            interaction_radius: 100.0,
            min_name_len: 2,
        }
    }
}

/// Which event a failed request is answered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorChannel {
    General,
    Interaction,
    Battle,
}

impl ErrorChannel {
    fn for_message(msg: &ClientMessage) -> Self {
        match msg {
            ClientMessage::Interact(_) => ErrorChannel::Interaction,
            ClientMessage::Answer(_) => ErrorChannel::Battle,
            _ => ErrorChannel::General,
        }
    }

    fn frame(self, message: String) -> ServerMessage {
        match self {
            ErrorChannel::General => ServerMessage::Error { message },
            ErrorChannel::Interaction => ServerMessage::InteractionError { message },
            ErrorChannel::Battle => ServerMessage::BattleError { message },
        }
    }
}

/// Binds connection events to the game components.
pub struct Coordinator {
    repo: Arc<dyn Repository>,
    registry: Arc<SessionRegistry>,
    missions: Arc<MissionTracker>,
    battles: BattleEngine,
    positions: PositionWriter,
    rules: WorldRules,
}

impl Coordinator {
    pub fn new(
        repo: Arc<dyn Repository>,
        registry: Arc<SessionRegistry>,
        missions: Arc<MissionTracker>,
        battles: BattleEngine,
        positions: PositionWriter,
        rules: WorldRules,
    ) -> Self {
        Self {
            repo,
            registry,
            missions,
            battles,
            positions,
            rules,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn positions(&self) -> &PositionWriter {
        &self.positions
    }

    async fn join(&self, session_id: SessionId, req: JoinRequest) -> Result<(), GameError> {
        if self.registry.player(session_id).is_some() {
            return Err(GameError::AlreadyJoined);
        }
        let name = req.name.trim();
        if name.chars().count() < self.rules.min_name_len {
            return Err(GameError::InvalidName {
                min: self.rules.min_name_len,
            });
        }

        let player = self.load_or_create(name).await?;
        let npcs = self.repo.get_npcs_by_map(&player.map).await?;
        let missions = self.missions.snapshot(player.id).await?;

        let live = LivePlayer {
            player_id: player.id,
            name: player.name.clone(),
            level: player.level,
            map: player.map.clone(),
            x: player.x,
            y: player.y,
        };
        let others = match self.registry.join(session_id, live) {
            Ok(others) => others,
            Err(RegistryError::NameInUse(name)) => return Err(GameError::AlreadyOnline(name)),
            Err(RegistryError::AlreadyJoined) => return Err(GameError::AlreadyJoined),
            Err(RegistryError::UnknownSession(_)) => {
                tracing::debug!(%session_id, "Join on a closed session ignored");
                return Ok(());
            }
        };

        let joined = ServerMessage::Joined {
            player: wire::player_view(&player),
            npcs: npcs.iter().map(wire::npc_view).collect(),
            missions: missions.iter().map(wire::mission_view).collect(),
            other_players: others
                .iter()
                .filter(|p| p.map == player.map)
                .map(wire::other_player_view)
                .collect(),
        };
        self.registry.send_to(session_id, &joined.to_json());

        let entered = ServerMessage::Entered {
            id: player.id,
            name: player.name.clone(),
            map: player.map.clone(),
            x: player.x,
            y: player.y,
        };
        self.registry.publish(&entered.to_json(), Some(session_id));

        tracing::info!(
            %session_id,
            player_id = player.id,
            name = %player.name,
            online = self.registry.active_count(),
            "Player joined"
        );
        Ok(())
    }

    async fn load_or_create(&self, name: &str) -> Result<PlayerRecord, GameError> {
        if let Some(player) = self.repo.get_player_by_name(name).await? {
            return Ok(player);
        }
        match self.repo.create_player(name).await {
            Ok(player) => Ok(player),
            // Lost a creation race against another connection.
            Err(RepoError::NameTaken(_)) => self
                .repo
                .get_player_by_name(name)
                .await?
                .ok_or_else(|| GameError::AlreadyOnline(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn move_to(&self, session_id: SessionId, req: MoveRequest) {
        if !req.x.is_finite() || !req.y.is_finite() {
            tracing::debug!(%session_id, "Ignoring non-finite position");
            return;
        }
        let Some(current) = self.registry.player(session_id) else {
            return;
        };
        let map = req.map.unwrap_or(current.map);
        let Some(live) = self.registry.update_position(session_id, req.x, req.y, &map) else {
            return;
        };

        self.positions.schedule(live.player_id, live.x, live.y, &live.map);
        let moved = ServerMessage::Moved {
            id: live.player_id,
            x: live.x,
            y: live.y,
            map: live.map,
        };
        self.registry.publish(&moved.to_json(), Some(session_id));
    }

    async fn interact(&self, session_id: SessionId, req: InteractRequest) -> Result<(), GameError> {
        let Some(live) = self.registry.player(session_id) else {
            return Ok(());
        };
        let npc = self
            .repo
            .get_npc_by_id(req.npc_id)
            .await?
            .filter(|npc| npc.active)
            .ok_or(GameError::NpcUnavailable(req.npc_id))?;

        let radius = self.rules.interaction_radius;
        let distance = if npc.map == live.map {
            npc.distance_to(live.x, live.y)
        } else {
            f64::INFINITY
        };
        if distance > radius {
            return Err(GameError::TooFar { distance, radius });
        }

        let player = self
            .repo
            .get_player_by_id(live.player_id)
            .await?
            .ok_or(GameError::PlayerNotFound(live.player_id))?;
        let question = {
            let mut rng = rand::rng();
            generate(Difficulty::for_level(player.level), &mut rng)
        };
        let battle_id = self.battles.open(&player, &npc, &question).await?;

        let start = ServerMessage::BattleStart {
            battle_id,
            npc_id: npc.id,
            npc_name: npc.name.clone(),
            question: question.prompt,
            explanation: question.explanation,
        };
        self.registry.send_to(session_id, &start.to_json());

        match self
            .missions
            .dispatch(player.id, &TriggerPayload::TalkNpc { npc_id: npc.id })
            .await
        {
            Ok(updates) => self.push_missions(session_id, player.id, &updates).await,
            Err(e) => tracing::warn!(player_id = player.id, "talk_npc dispatch failed: {}", e),
        }
        Ok(())
    }

    async fn answer(&self, session_id: SessionId, req: AnswerRequest) -> Result<(), GameError> {
        let Some(live) = self.registry.player(session_id) else {
            return Ok(());
        };
        let echoed = req.correct_answer.map(|solution| Question {
            prompt: req.question.unwrap_or_default(),
            solution,
            explanation: req.explanation.unwrap_or_default(),
        });

        let result = self
            .battles
            .resolve(AnswerSubmission {
                player_id: live.player_id,
                npc_id: req.npc_id,
                battle_id: req.battle_id,
                answer: req.answer,
                echoed,
            })
            .await?;

        let frame = ServerMessage::BattleResult(wire::battle_result_wire(&result));
        self.registry.send_to(session_id, &frame.to_json());
        if result.leveled_up {
            self.registry.set_level(session_id, result.level);
        }
        if result.npc_defeated {
            let defeated = ServerMessage::NpcDefeated {
                npc_id: result.npc_id,
                map: result.npc_map.clone(),
            };
            self.registry.publish(&defeated.to_json(), None);
            tracing::info!(
                player_id = live.player_id,
                npc_id = result.npc_id,
                "NPC defeated"
            );
        }
        self.push_missions(session_id, live.player_id, &result.mission_updates)
            .await;
        Ok(())
    }

    async fn missions_get(&self, session_id: SessionId) -> Result<(), GameError> {
        let Some(live) = self.registry.player(session_id) else {
            return Ok(());
        };
        self.send_missions(session_id, live.player_id).await
    }

    async fn mission_event(
        &self,
        session_id: SessionId,
        req: MissionEventRequest,
    ) -> Result<(), GameError> {
        let Some(live) = self.registry.player(session_id) else {
            return Ok(());
        };
        let payload = match req.kind.as_str() {
            "enter_portal" => TriggerPayload::EnterPortal {
                portal_entered: req.data.portal_entered,
            },
            other => {
                tracing::debug!(%session_id, kind = other, "Ignoring mission event");
                return Ok(());
            }
        };
        let updates = self.missions.dispatch(live.player_id, &payload).await?;
        self.push_missions(session_id, live.player_id, &updates).await;
        Ok(())
    }

    async fn send_missions(&self, session_id: SessionId, player_id: i64) -> Result<(), GameError> {
        let missions = self.missions.snapshot(player_id).await?;
        let frame = ServerMessage::MissionsUpdate(missions.iter().map(wire::mission_view).collect());
        self.registry.send_to(session_id, &frame.to_json());
        Ok(())
    }

    /// Push the mission list after a completion and track the rewarded level.
    async fn push_missions(&self, session_id: SessionId, player_id: i64, updates: &[MissionUpdate]) {
        let mut completed = false;
        for update in updates {
            if let MissionUpdate::Completed { level, .. } = update {
                completed = true;
                self.registry.set_level(session_id, *level);
            }
        }
        if !completed {
            return;
        }
        if let Err(e) = self.send_missions(session_id, player_id).await {
            tracing::warn!(player_id, "Failed to push missions: {}", e);
        }
    }

    fn report(&self, session_id: SessionId, channel: ErrorChannel, event: &str, err: &GameError) {
        match err.kind() {
            ErrorKind::Storage => {
                tracing::error!(%session_id, event, "Request failed: {}", err)
            }
            _ => tracing::debug!(%session_id, event, "Request rejected: {}", err),
        }
        let frame = channel.frame(err.client_message());
        self.registry.send_to(session_id, &frame.to_json());
    }
}

#[async_trait]
impl SessionHandler for Coordinator {
    async fn on_connect(&self, session_id: SessionId, outbound: SessionWriteTx) {
        self.registry.attach(session_id, outbound);
        tracing::debug!(%session_id, "Session connected");
    }

    async fn on_message(&self, session_id: SessionId, message: ClientMessage) {
        let channel = ErrorChannel::for_message(&message);
        let event = message.event_name();
        if !matches!(message, ClientMessage::Join(_))
            && self.registry.state(session_id) != SessionState::Active
        {
            tracing::debug!(%session_id, event, "Ignoring request before join");
            return;
        }
        let result = match message {
            ClientMessage::Join(req) => self.join(session_id, req).await,
            ClientMessage::Move(req) => {
                self.move_to(session_id, req);
                Ok(())
            }
            ClientMessage::Interact(req) => self.interact(session_id, req).await,
            ClientMessage::Answer(req) => self.answer(session_id, req).await,
            ClientMessage::MissionsGet => self.missions_get(session_id).await,
            ClientMessage::MissionEvent(req) => self.mission_event(session_id, req).await,
        };
        if let Err(e) = result {
            self.report(session_id, channel, event, &e);
        }
    }

    async fn on_disconnect(&self, session_id: SessionId) {
        let Some(live) = self.registry.detach(session_id) else {
            return;
        };
        self.positions.flush(live.player_id).await;
        let left = ServerMessage::Left { id: live.player_id };
        self.registry.publish(&left.to_json(), None);
        tracing::info!(
            %session_id,
            player_id = live.player_id,
            online = self.registry.active_count(),
            "Player left"
        );
    }
}
