use rusqlite::Connection;

use crate::battle::{self, BattleRepo};
use crate::error::RepoError;
use crate::mission::MissionRepo;
use crate::npc::{self, NpcRepo};
use crate::player::{self, PlayerRepo};
use crate::records::{CommitReceipt, ResolutionCommit};
use crate::schema;

/// Main database handle wrapping a SQLite connection.
pub struct PlayerDb {
    conn: Connection,
}

impl PlayerDb {
    /// Open (or create) a database at the given file path.
    pub fn open(path: &str) -> Result<Self, RepoError> {
        // Ensure parent directory exists
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RepoError::Database(rusqlite::Error::SqliteFailure(
                        rusqlite::ffi::Error::new(1),
                        Some(format!("failed to create dir: {}", e)),
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::init(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self, RepoError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, RepoError> {
        schema::create_tables(&conn)?;
        schema::seed_defaults(&conn)?;
        Ok(Self { conn })
    }

    pub fn player(&self) -> PlayerRepo<'_> {
        PlayerRepo::new(&self.conn)
    }

    pub fn npc(&self) -> NpcRepo<'_> {
        NpcRepo::new(&self.conn)
    }

    pub fn battle(&self) -> BattleRepo<'_> {
        BattleRepo::new(&self.conn)
    }

    pub fn mission(&self) -> MissionRepo<'_> {
        MissionRepo::new(&self.conn)
    }

    /// Apply one battle resolution in a single transaction.
    ///
    /// The NPC defeat is check-then-set; the win is credited only when this
    /// commit is the one that flipped the NPC. Everything else is written
    /// regardless, so the loser of a defeat race still sees its battle finish.
    pub fn commit_resolution(
        &mut self,
        commit: &ResolutionCommit,
    ) -> Result<CommitReceipt, RepoError> {
        let tx = self.conn.transaction()?;

        player::apply_stats_patch(&tx, commit.player_id, &commit.stats)?;
        battle::apply_battle_patch(&tx, commit.battle_id, &commit.battle)?;
        battle::append_answer(&tx, &commit.answer)?;

        let mut receipt = CommitReceipt::default();
        if let Some(defeat) = commit.npc_defeat {
            if npc::deactivate_if_active(&tx, defeat.npc_id, defeat.at)? {
                tx.execute(
                    "UPDATE players SET wins = wins + 1 WHERE id = ?1",
                    rusqlite::params![commit.player_id],
                )?;
                receipt.npc_defeated = true;
            }
        }

        tx.commit()?;
        Ok(receipt)
    }
}
