use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Raw `{"event": ..., "data": ...}` envelope. `data` may be absent.
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Client-to-server message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join(JoinRequest),
    Move(MoveRequest),
    Interact(InteractRequest),
    Answer(AnswerRequest),
    MissionsGet,
    MissionEvent(MissionEventRequest),
}

impl ClientMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::Join(_) => "player:join",
            ClientMessage::Move(_) => "player:move",
            ClientMessage::Interact(_) => "player:interact",
            ClientMessage::Answer(_) => "battle:answer",
            ClientMessage::MissionsGet => "missions:get",
            ClientMessage::MissionEvent(_) => "mission:event",
        }
    }
}

const CLIENT_EVENTS: &[&str] = &[
    "player:join",
    "player:move",
    "player:interact",
    "battle:answer",
    "missions:get",
    "mission:event",
];

/// Decode one inbound text frame. Missing payload fields take their defaults.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(text)?;
    let data = if envelope.data.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        envelope.data
    };

    let msg = match envelope.event.as_str() {
        "player:join" => ClientMessage::Join(serde_json::from_value(data)?),
        "player:move" => ClientMessage::Move(serde_json::from_value(data)?),
        "player:interact" => ClientMessage::Interact(serde_json::from_value(data)?),
        "battle:answer" => ClientMessage::Answer(serde_json::from_value(data)?),
        "missions:get" => ClientMessage::MissionsGet,
        "mission:event" => ClientMessage::MissionEvent(serde_json::from_value(data)?),
        other => return Err(de::Error::unknown_variant(other, CLIENT_EVENTS)),
    };
    Ok(msg)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct JoinRequest {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MoveRequest {
    pub x: f64,
    pub y: f64,
    /// Absent means "stay on the current map".
    pub map: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractRequest {
    pub npc_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnswerRequest {
    pub battle_id: Option<i64>,
    pub npc_id: i64,
    #[serde(deserialize_with = "lenient_string")]
    pub answer: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub question: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub correct_answer: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MissionEventRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: MissionEventData,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MissionEventData {
    pub portal_entered: bool,
}

/// Accept a string, number or bool and keep its textual form; null becomes "".
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(de::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

/// Server-to-client message (adjacently tagged JSON).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "player:joined", rename_all = "camelCase")]
    Joined {
        player: PlayerView,
        npcs: Vec<NpcView>,
        missions: Vec<MissionView>,
        other_players: Vec<OtherPlayerView>,
    },
    #[serde(rename = "player:entered")]
    Entered {
        id: i64,
        name: String,
        map: String,
        x: f64,
        y: f64,
    },
    #[serde(rename = "player:moved")]
    Moved { id: i64, x: f64, y: f64, map: String },
    #[serde(rename = "player:left")]
    Left { id: i64 },
    #[serde(rename = "battle:start", rename_all = "camelCase")]
    BattleStart {
        battle_id: i64,
        npc_id: i64,
        npc_name: String,
        question: String,
        explanation: String,
    },
    #[serde(rename = "battle:result")]
    BattleResult(BattleResultWire),
    #[serde(rename = "battle:error")]
    BattleError { message: String },
    #[serde(rename = "interaction:error")]
    InteractionError { message: String },
    #[serde(rename = "missions:update")]
    MissionsUpdate(Vec<MissionView>),
    #[serde(rename = "npc:defeated", rename_all = "camelCase")]
    NpcDefeated { npc_id: i64, map: String },
    #[serde(rename = "npc:respawned", rename_all = "camelCase")]
    NpcRespawned { npc_id: i64, map: String },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Serialize to a text frame.
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize server message: {}", e);
                r#"{"event":"error","data":{"message":"internal error"}}"#.to_string()
            }
        }
    }
}

/// Durable player stats as sent on join. Field names are snake_case on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
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

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NpcView {
    pub id: i64,
    pub name: String,
    pub map: String,
    pub x: f64,
    pub y: f64,
    pub active: bool,
    pub respawn_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissionView {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub target: i64,
    pub reward_exp: i64,
    pub reward_coins: i64,
    pub progress: i64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtherPlayerView {
    pub id: i64,
    pub name: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleResultWire {
    pub correct: bool,
    pub player_hp: i32,
    pub npc_hp: i32,
    pub player_damage: i32,
    pub enemy_damage: i32,
    pub exp_gain: i64,
    pub coin_gain: i64,
    pub npc_defeated: bool,
    pub player_defeated: bool,
    pub battle_id: i64,
    pub battle_ended: bool,
}
