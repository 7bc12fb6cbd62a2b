use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::time::Timestamp;

pub type PlayerId = u64;

/// Health every player has at spawn and after any reset.
pub const FULL_HEALTH: u8 = 100;

/// Longest accepted username, in characters.
pub const MAX_USERNAME_LEN: usize = 20;

/// Which side of the outbreak a player is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    #[default]
    Human,
    Zombie,
}

/// A connected player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub x: f32,
    pub y: f32,
    pub health: u8,
    pub faction: Faction,
    pub last_active: Timestamp,
    pub connection_id: String,
}

impl Player {
    /// A fresh human at `spawn`. The id is assigned by the store on insert.
    pub fn spawn(username: String, connection_id: String, spawn: Point, now: Timestamp) -> Self {
        Self {
            id: 0,
            username,
            x: spawn.x,
            y: spawn.y,
            health: FULL_HEALTH,
            faction: Faction::Human,
            last_active: now,
            connection_id,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_zombie(&self) -> bool {
        self.faction == Faction::Zombie
    }

    pub fn is_human(&self) -> bool {
        self.faction == Faction::Human
    }

    /// Back to a full-health human, as at the start of every round.
    pub fn reset_to_human(&mut self) {
        self.faction = Faction::Human;
        self.health = FULL_HEALTH;
    }

    /// Turn into a zombie. Returns false when already infected.
    pub fn infect(&mut self) -> bool {
        if self.is_zombie() {
            return false;
        }
        self.faction = Faction::Zombie;
        self.health = FULL_HEALTH;
        true
    }
}

/// Trim and validate a requested username.
pub fn normalize_username(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > MAX_USERNAME_LEN {
        return None;
    }
    Some(trimmed.to_string())
}
