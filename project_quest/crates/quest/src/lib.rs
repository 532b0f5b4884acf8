//! Game rules of the quest arena: question generation, battles, missions,
//! NPC respawn, and the per-connection coordinator that ties them to the
//! session registry.

pub mod battle;
pub mod coordinator;
pub mod error;
pub mod missions;
pub mod movement;
pub mod progression;
pub mod question;
pub mod respawn;
pub mod wire;

#[cfg(test)]
mod test_repo;

pub use battle::{AnswerSubmission, BattleEngine, BattleResult};
pub use coordinator::{Coordinator, WorldRules};
pub use error::{ErrorKind, GameError};
pub use missions::{MissionCatalog, MissionId, MissionTracker, MissionUpdate, TriggerPayload};
pub use movement::PositionWriter;
pub use progression::BattleConfig;
pub use question::{Difficulty, Question};
pub use respawn::RespawnScheduler;
