//! Record to wire-view conversions.

use net::protocol::{BattleResultWire, MissionView, NpcView, OtherPlayerView, PlayerView};
use player_db::{NpcRecord, PlayerMission, PlayerRecord};
use session::LivePlayer;

use crate::battle::BattleResult;

pub fn player_view(p: &PlayerRecord) -> PlayerView {
    PlayerView {
        id: p.id,
        name: p.name.clone(),
        level: p.level,
        exp: p.exp,
        hp: p.hp,
        max_hp: p.max_hp,
        coins: p.coins,
        wins: p.wins,
        losses: p.losses,
        map: p.map.clone(),
        x: p.x,
        y: p.y,
    }
}

pub fn npc_view(n: &NpcRecord) -> NpcView {
    NpcView {
        id: n.id,
        name: n.name.clone(),
        map: n.map.clone(),
        x: n.x,
        y: n.y,
        active: n.active,
        respawn_seconds: n.respawn_seconds,
    }
}

pub fn mission_view(m: &PlayerMission) -> MissionView {
    let d = &m.definition;
    MissionView {
        id: d.id,
        code: d.code.clone(),
        title: d.title.clone(),
        description: d.description.clone(),
        kind: d.trigger.as_str().to_string(),
        target: d.target,
        reward_exp: d.reward_exp,
        reward_coins: d.reward_coins,
        progress: m.progress,
        status: m.status.as_str().to_string(),
    }
}

pub fn other_player_view(p: &LivePlayer) -> OtherPlayerView {
    OtherPlayerView {
        id: p.player_id,
        name: p.name.clone(),
        x: p.x,
        y: p.y,
    }
}

pub fn battle_result_wire(r: &BattleResult) -> BattleResultWire {
    BattleResultWire {
        correct: r.correct,
        player_hp: r.player_hp,
        npc_hp: r.npc_hp,
        player_damage: r.player_damage,
        enemy_damage: r.enemy_damage,
        exp_gain: r.exp_gain,
        coin_gain: r.coin_gain,
        npc_defeated: r.npc_defeated,
        player_defeated: r.player_defeated,
        battle_id: r.battle_id,
        battle_ended: r.battle_ended,
    }
}
