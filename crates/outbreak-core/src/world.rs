use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::city::CityMap;
use crate::npc::Npc;
use crate::player::Player;
use crate::round::{Round, ScheduledTransition, Transition};
use crate::rules::GameRules;
use crate::store::{EntityStore, MemoryStore};
use crate::time::Timestamp;

/// Everything a client needs to render one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub now: Timestamp,
    pub round: Option<Round>,
    pub players: Vec<Player>,
    pub npcs: Vec<Npc>,
}

/// The authoritative game state plus the policy and map it is played on.
///
/// `World` is synchronous and has no notion of wall-clock time: every
/// operation takes an explicit `now`. Deferred transitions are not executed
/// here; they are queued and handed to the caller through
/// [`World::take_scheduled`], and come back later through [`World::fire`].
pub struct World {
    pub(crate) store: Box<dyn EntityStore>,
    pub(crate) rules: GameRules,
    pub(crate) map: CityMap,
    pub(crate) rng: StdRng,
    pub(crate) scheduled: Vec<ScheduledTransition>,
}

impl World {
    pub fn new(rules: GameRules, map: CityMap) -> Self {
        Self::with_store(Box::new(MemoryStore::new()), rules, map, StdRng::from_os_rng())
    }

    /// Deterministic world: same seed and same call sequence give the same state.
    pub fn with_seed(rules: GameRules, map: CityMap, seed: u64) -> Self {
        Self::with_store(
            Box::new(MemoryStore::new()),
            rules,
            map,
            StdRng::seed_from_u64(seed),
        )
    }

    pub fn with_store(
        store: Box<dyn EntityStore>,
        rules: GameRules,
        map: CityMap,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            rules,
            map,
            rng,
            scheduled: Vec::new(),
        }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn map(&self) -> &CityMap {
        &self.map
    }

    pub fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    pub fn round(&self) -> Option<Round> {
        self.store.round()
    }

    /// Drain the transitions queued since the last call.
    pub fn take_scheduled(&mut self) -> Vec<ScheduledTransition> {
        std::mem::take(&mut self.scheduled)
    }

    pub(crate) fn schedule(&mut self, fire_at: Timestamp, transition: Transition) {
        tracing::debug!(fire_at, ?transition, "transition scheduled");
        self.scheduled.push(ScheduledTransition {
            fire_at,
            transition,
        });
    }

    /// Apply `patch` to the round record. A missing round is not an error
    /// for internal bookkeeping; the write is dropped.
    pub(crate) fn update_round(&mut self, mut patch: impl FnMut(&mut Round)) {
        if let Err(err) = self.store.patch_round(&mut patch) {
            tracing::debug!(%err, "round update dropped");
        }
    }

    pub fn snapshot(&self, now: Timestamp) -> WorldSnapshot {
        let players = match now.checked_sub(self.rules.snapshot_window_ms) {
            Some(cutoff) => self.store.players_active_since(cutoff),
            None => self.store.players(),
        };
        WorldSnapshot {
            now,
            round: self.store.round(),
            players,
            npcs: self.store.npcs(),
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("round", &self.store.round())
            .field("players", &self.store.players().len())
            .field("npcs", &self.store.npcs().len())
            .field("scheduled", &self.scheduled.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{T0, join, seeded_world};

    #[test]
    fn snapshot_hides_long_gone_players() {
        let mut world = seeded_world(1);
        join(&mut world, "alice", T0);
        join(&mut world, "bob", T0 + 200_000);

        // alice goes stale but is not cleaned up yet; the 5 minute window hides her.
        let snap = world.snapshot(T0 + 350_000);
        let names: Vec<_> = snap.players.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["bob"]);
        assert!(snap.round.is_some());
    }

    #[test]
    fn take_scheduled_drains() {
        let mut world = seeded_world(1);
        world.schedule(T0, Transition::EndRound { round_start_time: T0 });
        assert_eq!(world.take_scheduled().len(), 1);
        assert!(world.take_scheduled().is_empty());
    }
}
