use player_db::RepoError;
use thiserror::Error;

/// Coarse classification of a failed operation, used to pick the reply event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    OutOfRange,
    Unavailable,
    Storage,
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("name must be at least {min} characters")]
    InvalidName { min: usize },

    #[error("player already online: {0}")]
    AlreadyOnline(String),

    #[error("session already joined")]
    AlreadyJoined,

    #[error("battle already finished")]
    BattleFinished,

    #[error("no question attached to this battle")]
    MissingQuestion,

    #[error("player not found: {0}")]
    PlayerNotFound(i64),

    #[error("npc not found: {0}")]
    NpcNotFound(i64),

    #[error("battle not found: {0}")]
    BattleNotFound(i64),

    #[error("too far to interact ({distance:.0} > {radius:.0})")]
    TooFar { distance: f64, radius: f64 },

    #[error("npc unavailable: {0}")]
    NpcUnavailable(i64),

    #[error("storage failure: {0}")]
    Storage(#[from] RepoError),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::InvalidName { .. }
            | GameError::AlreadyOnline(_)
            | GameError::AlreadyJoined
            | GameError::BattleFinished
            | GameError::MissingQuestion => ErrorKind::Validation,
            GameError::PlayerNotFound(_)
            | GameError::NpcNotFound(_)
            | GameError::BattleNotFound(_) => ErrorKind::NotFound,
            GameError::TooFar { .. } => ErrorKind::OutOfRange,
            GameError::NpcUnavailable(_) => ErrorKind::Unavailable,
            GameError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Text shown to the player. Storage details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            GameError::Storage(_) => "Server error, please try again".to_string(),
            GameError::NpcNotFound(_) | GameError::NpcUnavailable(_) => {
                "NPC not available".to_string()
            }
            GameError::TooFar { .. } => "Too far away to interact".to_string(),
            other => {
                let text = other.to_string();
                let mut chars = text.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => text,
                }
            }
        }
    }
}
