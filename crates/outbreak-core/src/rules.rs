use serde::Deserialize;

/// Tunable game policy. Every field has a default so a partial `[rules]`
/// table in the server config only overrides what it names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameRules {
    pub min_players_to_start: usize,
    pub max_players: usize,
    pub countdown_ms: u64,
    pub round_duration_ms: u64,
    pub return_to_lobby_ms: u64,
    /// A player is active while their last activity is younger than this.
    pub active_timeout_ms: u64,
    pub player_infection_radius: f32,
    pub npc_infection_radius: f32,
    /// NPCs kept alive per remaining human.
    pub npc_per_human: usize,
    pub max_npcs: usize,
    pub npc_debounce_ms: u64,
    pub npc_detection_radius: f32,
    pub npc_target_radius: f32,
    pub npc_hunt_retarget_ms: u64,
    pub npc_wander_retarget_ms: u64,
    pub npc_min_speed: f32,
    pub npc_max_speed: f32,
    /// Fraction of an NPC's speed used while meandering.
    pub npc_meander_speed_factor: f32,
    pub npc_max_delta_secs: f32,
    pub path_probe_samples: u32,
    pub meander_search_radius: f32,
    /// Weight of the waypoint→human leg when routing around a building.
    pub hunt_goal_weight: f32,
    pub spawn_jitter: f32,
    pub waypoint_jitter: f32,
    /// Players seen within this window show up in snapshots.
    pub snapshot_window_ms: u64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            min_players_to_start: 2,
            max_players: 20,
            countdown_ms: 10_000,
            round_duration_ms: 300_000,
            return_to_lobby_ms: 10_000,
            active_timeout_ms: 30_000,
            player_infection_radius: 25.0,
            npc_infection_radius: 20.0,
            npc_per_human: 5,
            max_npcs: 200,
            npc_debounce_ms: 100,
            npc_detection_radius: 150.0,
            npc_target_radius: 8.0,
            npc_hunt_retarget_ms: 2_000,
            npc_wander_retarget_ms: 5_000,
            npc_min_speed: 80.0,
            npc_max_speed: 120.0,
            npc_meander_speed_factor: 0.6,
            npc_max_delta_secs: 0.1,
            path_probe_samples: 8,
            meander_search_radius: 200.0,
            hunt_goal_weight: 0.5,
            spawn_jitter: 100.0,
            waypoint_jitter: 40.0,
            snapshot_window_ms: 300_000,
        }
    }
}

impl GameRules {
    /// Problems that would make the simulation misbehave. Empty when valid.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.min_players_to_start == 0 {
            problems.push("rules.min_players_to_start must be > 0".to_string());
        }
        if self.max_players < self.min_players_to_start {
            problems.push("rules.max_players must be >= min_players_to_start".to_string());
        }
        if self.round_duration_ms == 0 {
            problems.push("rules.round_duration_ms must be > 0".to_string());
        }
        if self.active_timeout_ms == 0 {
            problems.push("rules.active_timeout_ms must be > 0".to_string());
        }
        if !(self.npc_min_speed.is_finite() && self.npc_max_speed.is_finite())
            || self.npc_min_speed <= 0.0
            || self.npc_max_speed < self.npc_min_speed
        {
            problems.push("rules.npc_min_speed must be > 0 and <= npc_max_speed".to_string());
        }
        if self.path_probe_samples == 0 {
            problems.push("rules.path_probe_samples must be > 0".to_string());
        }
        if !(self.npc_max_delta_secs.is_finite() && self.npc_max_delta_secs > 0.0) {
            problems.push("rules.npc_max_delta_secs must be > 0".to_string());
        }
        // Jitter bounds feed symmetric random ranges, which reject an inverted span.
        for (name, value) in [
            ("spawn_jitter", self.spawn_jitter),
            ("waypoint_jitter", self.waypoint_jitter),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                problems.push(format!("rules.{name} must be a finite value >= 0"));
            }
        }
        problems
    }
}
