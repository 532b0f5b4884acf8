use std::path::Path;
use std::time::Duration;

use player_db::SpawnPoint;
use quest::{BattleConfig, WorldRules};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetSection {
    pub ws_addr: String,
    pub max_input_length: usize,
}

impl Default for NetSection {
    fn default() -> Self {
        Self {
            ws_addr: "0.0.0.0:4000".to_string(),
            max_input_length: 4096,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: "data/quest.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldSection {
    pub spawn_map: String,
    pub spawn_x: f64,
    pub spawn_y: f64,
    pub interaction_radius: f64,
    pub min_name_len: usize,
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            spawn_map: "map-city".to_string(),
            spawn_x: 400.0,
            spawn_y: 300.0,
            interaction_radius: 100.0,
            min_name_len: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RespawnSection {
    pub interval_secs: u64,
}

impl Default for RespawnSection {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MovementSection {
    /// Debounce window for durable position writes.
    pub position_flush_ms: u64,
}

impl Default for MovementSection {
    fn default() -> Self {
        Self {
            position_flush_ms: 1000,
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub net: NetSection,
    pub database: DatabaseSection,
    pub world: WorldSection,
    pub battle: BattleConfig,
    pub respawn: RespawnSection,
    pub movement: MovementSection,
}

impl ServerConfig {
    /// Load configuration from an optional TOML file path.
    /// Falls back to defaults if path is None or the file doesn't exist.
    pub fn load(config_path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let config = match config_path {
            Some(path) if Path::new(path).exists() => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            Some(path) => {
                tracing::warn!(path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        Ok(config)
    }

    pub fn spawn_point(&self) -> SpawnPoint {
        SpawnPoint {
            map: self.world.spawn_map.clone(),
            x: self.world.spawn_x,
            y: self.world.spawn_y,
        }
    }

    pub fn world_rules(&self) -> WorldRules {
        WorldRules {
            interaction_radius: self.world.interaction_radius,
            min_name_len: self.world.min_name_len,
        }
    }

    /// Never zero: a zero period would make the respawn ticker panic.
    pub fn respawn_period(&self) -> Duration {
        Duration::from_secs(self.respawn.interval_secs.max(1))
    }

    pub fn position_window(&self) -> Duration {
        Duration::from_millis(self.movement.position_flush_ms)
    }
}

/// Extract `--config <path>` from command-line arguments (program name excluded).
pub fn config_path_from_args(args: &[String]) -> Result<Option<String>, String> {
    let mut config_path = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => match args.get(i + 1) {
                Some(val) => {
                    config_path = Some(val.clone());
                    i += 2;
                }
                None => return Err("--config requires a path argument".to_string()),
            },
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }
    Ok(config_path)
}

/// Parse CLI arguments and load the configuration, exiting on error.
pub fn parse_cli_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = match config_path_from_args(&args) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    match ServerConfig::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_matches_hardcoded_values() {
        let config = ServerConfig::default();
        assert_eq!(config.net.ws_addr, "0.0.0.0:4000");
        assert_eq!(config.net.max_input_length, 4096);
        assert_eq!(config.database.path, "data/quest.db");
        assert_eq!(config.world.spawn_map, "map-city");
        assert_eq!(config.world.interaction_radius, 100.0);
        assert_eq!(config.battle.npc_max_hp, 100);
        assert_eq!(config.battle.coin_reward, 5);
        assert_eq!(config.respawn.interval_secs, 30);
        assert_eq!(config.movement.position_flush_ms, 1000);
    }

    #[test]
    fn load_none_returns_defaults() {
        let config = ServerConfig::load(None).unwrap();
        assert_eq!(config.net.ws_addr, "0.0.0.0:4000");
    }

    #[test]
    fn load_nonexistent_returns_defaults() {
        let config = ServerConfig::load(Some("/nonexistent/path/quest.toml")).unwrap();
        assert_eq!(config.respawn.interval_secs, 30);
    }

    #[test]
    fn load_partial_toml_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[net]
ws_addr = "127.0.0.1:5000"

[battle]
coin_reward = 9

[respawn]
interval_secs = 5
"#
        )
        .unwrap();

        let config = ServerConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.net.ws_addr, "127.0.0.1:5000");
        assert_eq!(config.net.max_input_length, 4096);
        assert_eq!(config.battle.coin_reward, 9);
        assert_eq!(config.battle.player_base_damage, 5);
        assert_eq!(config.respawn_period(), Duration::from_secs(5));
        assert_eq!(config.database.path, "data/quest.db");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[net\nws_addr = 1").unwrap();
        assert!(ServerConfig::load(Some(file.path().to_str().unwrap())).is_err());
    }

    #[test]
    fn zero_respawn_interval_is_clamped() {
        let mut config = ServerConfig::default();
        config.respawn.interval_secs = 0;
        assert_eq!(config.respawn_period(), Duration::from_secs(1));
    }

    #[test]
    fn conversions() {
        let config = ServerConfig::default();
        let spawn = config.spawn_point();
        assert_eq!(spawn.map, "map-city");
        assert_eq!((spawn.x, spawn.y), (400.0, 300.0));
        assert_eq!(config.world_rules(), WorldRules::default());
        assert_eq!(config.position_window(), Duration::from_millis(1000));
    }

    #[test]
    fn cli_args() {
        let args = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(config_path_from_args(&args(&[])), Ok(None));
        assert_eq!(
            config_path_from_args(&args(&["--config", "quest.toml"])),
            Ok(Some("quest.toml".to_string()))
        );
        assert!(config_path_from_args(&args(&["--config"])).is_err());
        assert!(config_path_from_args(&args(&["--mode", "grid"])).is_err());
    }
}
