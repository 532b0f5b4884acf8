use rusqlite::Connection;

use crate::error::RepoError;

pub fn create_tables(conn: &Connection) -> Result<(), RepoError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS players (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            name       TEXT NOT NULL UNIQUE,
            level      INTEGER NOT NULL DEFAULT 1,
            exp        INTEGER NOT NULL DEFAULT 0,
            hp         INTEGER NOT NULL DEFAULT 100,
            max_hp     INTEGER NOT NULL DEFAULT 100,
            coins      INTEGER NOT NULL DEFAULT 0,
            wins       INTEGER NOT NULL DEFAULT 0,
            losses     INTEGER NOT NULL DEFAULT 0,
            last_map   TEXT NOT NULL,
            x          REAL NOT NULL,
            y          REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS npcs (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            name             TEXT NOT NULL,
            map              TEXT NOT NULL,
            x                REAL NOT NULL,
            y                REAL NOT NULL,
            active           INTEGER NOT NULL DEFAULT 1,
            last_defeated_at TEXT,
            respawn_sec      INTEGER NOT NULL DEFAULT 60
        );

        CREATE TABLE IF NOT EXISTS battles (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id     INTEGER NOT NULL REFERENCES players(id),
            npc_id        INTEGER NOT NULL REFERENCES npcs(id),
            player_hp     INTEGER NOT NULL,
            npc_hp        INTEGER NOT NULL,
            state         TEXT NOT NULL DEFAULT 'active',
            question_json TEXT,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS missions (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            code         TEXT NOT NULL UNIQUE,
            title        TEXT NOT NULL,
            description  TEXT NOT NULL,
            type         TEXT NOT NULL,
            target       INTEGER NOT NULL,
            reward_exp   INTEGER NOT NULL,
            reward_coins INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS player_missions (
            player_id  INTEGER NOT NULL REFERENCES players(id),
            mission_id INTEGER NOT NULL REFERENCES missions(id),
            progress   INTEGER NOT NULL DEFAULT 0,
            status     TEXT NOT NULL DEFAULT 'active',
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (player_id, mission_id)
        );

        CREATE TABLE IF NOT EXISTS answers_log (
            id                     INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id              INTEGER NOT NULL REFERENCES players(id),
            npc_id                 INTEGER NOT NULL REFERENCES npcs(id),
            question_snapshot_json TEXT NOT NULL,
            correct                INTEGER NOT NULL,
            delta_hp               INTEGER NOT NULL,
            exp_gain               INTEGER NOT NULL,
            created_at             TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

/// Insert the mission catalog and the starting NPC roster. Safe to rerun.
pub fn seed_defaults(conn: &Connection) -> Result<(), RepoError> {
    conn.execute_batch(
        "
        INSERT OR IGNORE INTO missions (code, title, description, type, target, reward_exp, reward_coins) VALUES
            ('M001', 'First Contact', 'Talk to any NPC in the city', 'talk_npc', 1, 20, 10),
            ('M002', 'Sharp Mind', 'Answer 5 questions correctly', 'correct_answers', 5, 50, 20),
            ('M003', 'Explorer', 'Walk through the portal into the forest', 'enter_portal', 1, 30, 15);
        ",
    )?;

    let npc_count: i64 = conn.query_row("SELECT COUNT(*) FROM npcs", [], |row| row.get(0))?;
    if npc_count == 0 {
        conn.execute_batch(
            "
            INSERT INTO npcs (name, map, x, y, respawn_sec) VALUES
                ('Matemago', 'map-city', 600, 400, 60),
                ('Calculista', 'map-city', 700, 500, 60),
                ('Guardian of Numbers', 'map-forest', 300, 300, 60);
            ",
        )?;
        tracing::info!("Seeded starting NPC roster");
    }
    Ok(())
}
