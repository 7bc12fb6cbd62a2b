use serde::{Deserialize, Serialize};

use crate::player::PlayerId;
use crate::time::Timestamp;

/// Lifecycle phase of the round. A countdown is a `Lobby` round with a
/// `countdown_deadline` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    #[default]
    Lobby,
    Playing,
    Ended,
}

/// The singleton round record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Round {
    pub status: RoundStatus,
    pub host: Option<PlayerId>,
    pub round_start_time: Option<Timestamp>,
    pub round_end_time: Option<Timestamp>,
    pub countdown_deadline: Option<Timestamp>,
    pub player_count: usize,
    pub zombie_count: usize,
    pub last_npc_update: Option<Timestamp>,
}

impl Round {
    pub fn countdown_active(&self) -> bool {
        self.status == RoundStatus::Lobby && self.countdown_deadline.is_some()
    }

    /// Back to lobby defaults: no host, no timers, zero counts.
    pub fn clear(&mut self) {
        *self = Round::default();
    }
}

/// A deferred state change. Each variant carries the value it expects the
/// round to still hold when it fires; a mismatch turns the firing into a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    StartRound { countdown_deadline: Timestamp },
    EndRound { round_start_time: Timestamp },
    ReturnToLobby { round_end_time: Timestamp },
}

/// A transition together with the time it should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTransition {
    pub fire_at: Timestamp,
    pub transition: Transition,
}
