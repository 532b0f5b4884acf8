use player_db::{PlayerRecord, PlayerStatsPatch};
use serde::Deserialize;

/// `level = floor(1 + sqrt(exp) / 2)`, never below 1.
pub fn level_for_exp(exp: i64) -> u32 {
    let exp = exp.max(0) as f64;
    (1.0 + exp.sqrt() / 2.0).floor() as u32
}

/// `max_hp = 100 + (level - 1) * 20`.
pub fn max_hp_for_level(level: u32) -> i32 {
    100 + (level.max(1) as i32 - 1) * 20
}

/// Damage and reward tuning for battles.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    pub player_base_damage: i32,
    pub player_damage_scale: f64,
    pub enemy_base_damage: i32,
    pub enemy_damage_scale: f64,
    pub base_exp_gain: i64,
    /// Upper bound of the random exp bonus (inclusive).
    pub exp_gain_range: i64,
    pub coin_reward: i64,
    pub npc_max_hp: i32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            player_base_damage: 5,
            player_damage_scale: 1.5,
            enemy_base_damage: 3,
            enemy_damage_scale: 1.2,
            base_exp_gain: 10,
            exp_gain_range: 5,
            coin_reward: 5,
            npc_max_hp: 100,
        }
    }
}

impl BattleConfig {
    pub fn player_damage(&self, level: u32) -> i32 {
        self.player_base_damage + (level as f64 * self.player_damage_scale).floor() as i32
    }

    pub fn enemy_damage(&self, level: u32) -> i32 {
        self.enemy_base_damage + (level as f64 * self.enemy_damage_scale).floor() as i32
    }
}

/// Result of adding experience (and coins) to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Growth {
    pub exp: i64,
    pub coins: i64,
    pub level: u32,
    pub max_hp: i32,
    /// HP after the gain; a level-up heals to the new maximum.
    pub hp: i32,
    pub leveled_up: bool,
}

impl Growth {
    pub fn to_patch(self) -> PlayerStatsPatch {
        PlayerStatsPatch {
            level: Some(self.level),
            exp: Some(self.exp),
            hp: Some(self.hp),
            max_hp: Some(self.max_hp),
            coins: Some(self.coins),
            ..Default::default()
        }
    }
}

/// Add `exp_gain` and `coin_gain` to `player`, recomputing level and max HP.
pub fn grow(player: &PlayerRecord, hp: i32, exp_gain: i64, coin_gain: i64) -> Growth {
    let exp = player.exp + exp_gain.max(0);
    let level = level_for_exp(exp).max(player.level);
    let leveled_up = level > player.level;
    let max_hp = if leveled_up {
        max_hp_for_level(level)
    } else {
        player.max_hp
    };
    Growth {
        exp,
        coins: player.coins + coin_gain,
        level,
        max_hp,
        hp: if leveled_up { max_hp } else { hp },
        leveled_up,
    }
}
