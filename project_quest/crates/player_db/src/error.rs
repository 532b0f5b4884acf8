use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),

    #[error("player name already taken: {0}")]
    NameTaken(String),

    #[error("player not found: {0}")]
    PlayerNotFound(i64),

    #[error("battle not found: {0}")]
    BattleNotFound(i64),

    #[error("mission not found: {0}")]
    MissionNotFound(String),
}
