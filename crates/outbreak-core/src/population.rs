use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::{Point, WORLD_HEIGHT, WORLD_WIDTH};
use crate::npc::{NPC_RADIUS, Npc};
use crate::round::RoundStatus;
use crate::time::Timestamp;
use crate::world::World;

/// Spawned NPCs keep this far from the world edge.
const SPAWN_MARGIN: f32 = 20.0;
/// Jittered spawn positions tried before settling for the bare spawn point.
const SPAWN_ATTEMPTS: usize = 8;
/// Upper bound of the random delay before a fresh NPC first picks a target.
const INITIAL_WANDER_DELAY_MS: u64 = 3_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub humans: usize,
    pub target: usize,
    pub before: usize,
    pub spawned: usize,
    pub removed: usize,
}

impl World {
    /// Grow or shrink the NPC horde to match the number of humans still
    /// standing. Does nothing outside a running round.
    pub fn balance_npcs(&mut self, now: Timestamp) -> BalanceReport {
        let playing = self
            .store
            .round()
            .is_some_and(|r| r.status == RoundStatus::Playing);
        if !playing {
            return BalanceReport::default();
        }

        let humans = self
            .active_players(now)
            .iter()
            .filter(|p| p.is_human())
            .count();
        let target = (humans * self.rules.npc_per_human).min(self.rules.max_npcs);
        let npcs = self.store.npcs();
        let mut report = BalanceReport {
            humans,
            target,
            before: npcs.len(),
            ..BalanceReport::default()
        };

        if npcs.len() < target {
            for _ in npcs.len()..target {
                let npc = self.fresh_npc(now);
                self.store.insert_npc(npc);
                report.spawned += 1;
            }
        } else {
            for npc in npcs.iter().take(npcs.len() - target) {
                match self.store.delete_npc(npc.id) {
                    Ok(_) => report.removed += 1,
                    Err(err) => tracing::debug!(npc_id = npc.id, %err, "NPC already removed"),
                }
            }
        }

        if report.spawned > 0 || report.removed > 0 {
            tracing::info!(
                humans,
                target,
                spawned = report.spawned,
                removed = report.removed,
                "NPC population balanced"
            );
        }
        report
    }

    /// Delete every NPC. Returns how many were removed.
    pub fn clear_npcs(&mut self) -> usize {
        self.store
            .npcs()
            .into_iter()
            .filter(|npc| self.store.delete_npc(npc.id).is_ok())
            .count()
    }

    fn fresh_npc(&mut self, now: Timestamp) -> Npc {
        let at = self.npc_spawn_position();
        let (min, max) = (self.rules.npc_min_speed, self.rules.npc_max_speed);
        let speed = if max > min {
            self.rng.random_range(min..max)
        } else {
            min
        };
        let wander_cooldown = now + self.rng.random_range(0..INITIAL_WANDER_DELAY_MS);
        Npc::spawn(at, speed, now, wander_cooldown)
    }

    fn npc_spawn_position(&mut self) -> Point {
        let spawns = self.map.valid_spawn_points();
        if spawns.is_empty() {
            return Point::new(WORLD_WIDTH / 2.0, WORLD_HEIGHT / 2.0);
        }
        let base = spawns[self.rng.random_range(0..spawns.len())];
        let half = self.rules.spawn_jitter / 2.0;
        for _ in 0..SPAWN_ATTEMPTS {
            let candidate = Point::new(
                base.x + self.rng.random_range(-half..=half),
                base.y + self.rng.random_range(-half..=half),
            )
            .clamp_to_world(SPAWN_MARGIN);
            if !self.map.collides(candidate, NPC_RADIUS) {
                return candidate;
            }
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::GameRules;
    use crate::test_helpers::{T0, join, seeded_world, start_round, world_with_rules};

    #[test]
    fn balance_is_noop_outside_playing() {
        let mut world = seeded_world(2);
        join(&mut world, "a", T0);
        assert_eq!(world.balance_npcs(T0), BalanceReport::default());
        assert!(world.store().npcs().is_empty());
    }

    #[test]
    fn spawns_clear_of_buildings_and_in_bounds() {
        let mut world = seeded_world(2);
        for name in ["a", "b", "c", "d", "e", "f"] {
            join(&mut world, name, T0);
        }
        let started = start_round(&mut world, T0);
        let npcs = world.store().npcs();
        assert_eq!(npcs.len(), 25);
        for npc in npcs {
            assert!((SPAWN_MARGIN..=WORLD_WIDTH - SPAWN_MARGIN).contains(&npc.x));
            assert!((SPAWN_MARGIN..=WORLD_HEIGHT - SPAWN_MARGIN).contains(&npc.y));
            assert!(!world.map().collides(npc.position(), NPC_RADIUS));
            assert!((80.0..120.0).contains(&npc.speed));
            assert!(npc.wander_cooldown >= started && npc.wander_cooldown < started + 3_000);
            assert_eq!(npc.target(), npc.position());
        }
    }

    #[test]
    fn balance_is_idempotent() {
        let mut world = seeded_world(2);
        join(&mut world, "a", T0);
        join(&mut world, "b", T0);
        join(&mut world, "c", T0);
        let started = start_round(&mut world, T0);
        let ids: Vec<_> = world.store().npcs().iter().map(|n| n.id).collect();

        let report = world.balance_npcs(started + 10);
        assert_eq!((report.spawned, report.removed), (0, 0));
        let again: Vec<_> = world.store().npcs().iter().map(|n| n.id).collect();
        assert_eq!(ids, again);
    }

    #[test]
    fn surplus_removes_oldest_first() {
        let mut world = seeded_world(2);
        join(&mut world, "a", T0);
        join(&mut world, "b", T0);
        join(&mut world, "c", T0);
        let started = start_round(&mut world, T0);
        let ids: Vec<_> = world.store().npcs().iter().map(|n| n.id).collect();
        assert_eq!(ids.len(), 10);

        let human = world
            .store()
            .players()
            .into_iter()
            .find(|p| p.is_human())
            .unwrap()
            .id;
        world.disconnect(human, started + 10).unwrap();
        let left: Vec<_> = world.store().npcs().iter().map(|n| n.id).collect();
        assert_eq!(left, ids[5..].to_vec());
    }

    #[test]
    fn target_is_capped() {
        let rules = GameRules {
            npc_per_human: 10,
            max_npcs: 12,
            ..GameRules::default()
        };
        let mut world = world_with_rules(rules, 2);
        join(&mut world, "a", T0);
        join(&mut world, "b", T0);
        join(&mut world, "c", T0);
        start_round(&mut world, T0);
        assert_eq!(world.store().npcs().len(), 12);
    }

    #[test]
    fn clear_counts_removed() {
        let mut world = seeded_world(2);
        join(&mut world, "a", T0);
        join(&mut world, "b", T0);
        start_round(&mut world, T0);
        assert_eq!(world.clear_npcs(), 5);
        assert_eq!(world.clear_npcs(), 0);
    }
}
