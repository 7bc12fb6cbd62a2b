pub mod city;
pub mod coordinator;
pub mod error;
pub mod geometry;
pub mod infection;
pub mod npc;
pub mod player;
pub mod population;
pub mod presence;
pub mod round;
pub mod rules;
pub mod steering;
pub mod store;
pub mod time;
pub mod world;

pub use error::{ErrorKind, GameError, StoreError};
pub use world::{World, WorldSnapshot};

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::city::CityMap;
    use crate::geometry::Point;
    use crate::npc::{Npc, NpcId};
    use crate::player::PlayerId;
    use crate::rules::GameRules;
    use crate::time::Timestamp;
    use crate::world::World;

    /// A fixed, realistic epoch-ms starting point for scripted scenarios.
    pub const T0: Timestamp = 1_700_000_000_000;

    /// Default rules and the real city, seeded.
    pub fn seeded_world(seed: u64) -> World {
        World::with_seed(GameRules::default(), CityMap::default(), seed)
    }

    /// Default rules on a map without buildings.
    pub fn open_world(seed: u64) -> World {
        World::with_seed(GameRules::default(), CityMap::open(), seed)
    }

    pub fn world_with_rules(rules: GameRules, seed: u64) -> World {
        World::with_seed(rules, CityMap::default(), seed)
    }

    /// Join with a connection id derived from the name. Panics on rejection.
    pub fn join(world: &mut World, username: &str, now: Timestamp) -> PlayerId {
        world
            .join(username, format!("conn-{username}"), now)
            .unwrap_or_else(|e| panic!("join {username} failed: {e}"))
            .player_id
    }

    /// Fire every queued transition due at or before `now`, earliest first.
    /// Later ones stay queued. Returns how many applied.
    pub fn fire_due(world: &mut World, now: Timestamp) -> usize {
        let (mut due, later): (Vec<_>, Vec<_>) = world
            .take_scheduled()
            .into_iter()
            .partition(|s| s.fire_at <= now);
        world.scheduled.extend(later);
        due.sort_by_key(|s| s.fire_at);
        due.into_iter()
            .filter(|s| world.fire(s.transition, s.fire_at))
            .count()
    }

    /// Host starts the countdown at `now` and it runs out. Returns the round
    /// start time.
    pub fn start_round(world: &mut World, now: Timestamp) -> Timestamp {
        let host = world
            .round()
            .and_then(|r| r.host)
            .expect("round has a host");
        let deadline = world
            .start_countdown(host, now)
            .unwrap_or_else(|e| panic!("countdown refused: {e}"));
        assert_eq!(fire_due(world, deadline), 1, "round did not start");
        deadline
    }

    /// Teleport a player without touching activity or running infection.
    pub fn place(world: &mut World, player_id: PlayerId, at: Point) {
        world
            .store
            .patch_player(player_id, &mut |p| {
                p.x = at.x;
                p.y = at.y;
            })
            .expect("player exists");
    }

    /// Mark a player as seen at `now`.
    pub fn touch(world: &mut World, player_id: PlayerId, now: Timestamp) {
        world
            .store
            .patch_player(player_id, &mut |p| p.last_active = now)
            .expect("player exists");
    }

    /// Move every NPC to one spot, out of the way of a scripted scene.
    pub fn park_npcs(world: &mut World, at: Point) {
        for npc in world.store.npcs() {
            let _ = world.store.patch_npc(npc.id, &mut |n| {
                n.x = at.x;
                n.y = at.y;
                n.target_x = at.x;
                n.target_y = at.y;
            });
        }
    }

    /// Insert an idle NPC, bypassing population balancing.
    pub fn spawn_npc_at(world: &mut World, at: Point, now: Timestamp) -> NpcId {
        world.store.insert_npc(Npc::spawn(at, 100.0, now, now))
    }
}
