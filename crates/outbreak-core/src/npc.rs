use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::time::Timestamp;

pub type NpcId = u64;

/// Collision half-extent of an NPC zombie.
pub const NPC_RADIUS: f32 = 10.0;

/// A server-driven zombie agent. Position state only; NPCs have no identity
/// beyond their id and never survive a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Npc {
    pub id: NpcId,
    pub x: f32,
    pub y: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub speed: f32,
    pub last_move_time: Timestamp,
    pub wander_cooldown: Timestamp,
    /// Mode chosen at the last retarget: chasing a human or meandering.
    #[serde(default)]
    pub hunting: bool,
}

impl Npc {
    /// An idle NPC parked on its spawn position.
    pub fn spawn(at: Point, speed: f32, now: Timestamp, wander_cooldown: Timestamp) -> Self {
        Self {
            id: 0,
            x: at.x,
            y: at.y,
            target_x: at.x,
            target_y: at.y,
            speed,
            last_move_time: now,
            wander_cooldown,
            hunting: false,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn target(&self) -> Point {
        Point::new(self.target_x, self.target_y)
    }
}
